//! `tally intake` command - commit a clinical intake file
//!
//! An intake file holds one visit: the patient demographics page and any of
//! the biopsy pages (`psa`, `imaging`, `pathology`, `core_sites`). Naming an
//! existing `biopsy_id` updates only the fields present in the file.

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::helpers::{open_database, success};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Domain;
use crate::entities::intake::{IntakeSession, Page};

#[derive(clap::Args, Debug)]
pub struct IntakeArgs {
    /// Intake file (YAML)
    pub file: PathBuf,

    /// Parse and check page membership without writing
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(args: IntakeArgs, global: &GlobalOpts) -> Result<()> {
    let session = IntakeSession::load(&args.file)?;

    if args.dry_run {
        for page in Page::ALL {
            let fields = session.page(page);
            if fields.is_empty() {
                continue;
            }
            println!("{}", style(page).bold());
            for (name, value) in fields.iter() {
                println!("  {}: {}", name, value);
            }
        }
        return Ok(());
    }

    if !session.is_dirty() {
        return Err(miette::miette!("{} has no fields to commit", args.file.display()));
    }

    let mut db = open_database(global, Domain::Clinical)?;
    let outcome = session.commit(&mut db)?;

    match global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&outcome).into_diagnostic()?);
        }
        OutputFormat::Yaml => print!("{}", serde_yml::to_string(&outcome).into_diagnostic()?),
        OutputFormat::Id => {
            if let Some(id) = outcome.biopsy_id {
                println!("{}", id);
            }
        }
        _ => {
            let verb = |created: bool| if created { "Created" } else { "Updated" };
            success(
                global,
                format!("{} patient {}", verb(outcome.created_patient), style(outcome.patient_id).cyan()),
            );
            if let Some(biopsy) = outcome.biopsy_id {
                success(
                    global,
                    format!("{} biopsy {}", verb(outcome.created_biopsy), style(biopsy).cyan()),
                );
            }
            if !global.quiet {
                if let Some(ratio) = outcome.free_psa_ratio {
                    println!("   Free/total PSA: {:.1}%", ratio);
                }
                if let Some(density) = outcome.psa_density {
                    println!("   PSA density: {:.2}", density);
                }
            }
        }
    }
    Ok(())
}
