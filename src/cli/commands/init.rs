//! `tally init` command - Initialize a new tally project

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::helpers::success;
use crate::cli::GlobalOpts;
use crate::core::project::{Project, ProjectError};
use crate::core::{Database, Domain};

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Force initialization even if .tally/ already exists
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs, global: &GlobalOpts) -> Result<()> {
    let path = if args.path.as_os_str() == "." {
        std::env::current_dir().into_diagnostic()?
    } else {
        args.path.clone()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).into_diagnostic()?;
        success(
            global,
            format!("Created directory {}", style(path.display()).cyan()),
        );
    }

    let project = if args.force {
        Project::init_force(&path)
    } else {
        Project::init(&path)
    };

    match project {
        Ok(project) => {
            for domain in Domain::ALL {
                Database::open_in(&project, domain)?;
            }
            success(
                global,
                format!(
                    "Initialized tally project at {}",
                    style(project.root().display()).cyan()
                ),
            );
            if !global.quiet {
                println!();
                println!("Created:");
                println!("  {}", style(".tally/config.yaml").dim());
                for domain in Domain::ALL {
                    println!("  {}", style(format!(".tally/{}", domain.file_name())).dim());
                }
                println!();
                println!("Next steps:");
                println!(
                    "  {} Add a product category",
                    style("tally record new categories --set name=Cables").yellow()
                );
                println!("  {} List available reports", style("tally report --list").yellow());
            }
            Ok(())
        }
        Err(ProjectError::AlreadyExists(path)) => {
            println!(
                "{} tally project already exists at {}",
                style("!").yellow(),
                style(path.display()).cyan()
            );
            println!();
            println!("Use {} to reinitialize", style("tally init --force").yellow());
            Ok(())
        }
        Err(e) => Err(miette::miette!("{}", e)),
    }
}
