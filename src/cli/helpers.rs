//! Shared helper functions for CLI commands
//!
//! Project discovery, database opening and output-format resolution used by
//! every command module.

use clap::ValueEnum;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{Config, Database, Domain, Project};

/// Find the project from `--project` or the working directory
pub fn project(global: &GlobalOpts) -> Result<Project> {
    match &global.project {
        Some(path) => Project::discover_from(path).into_diagnostic(),
        None => Project::discover().into_diagnostic(),
    }
}

/// Open one domain database of the current project
pub fn open_database(global: &GlobalOpts, domain: Domain) -> Result<Database> {
    let project = project(global)?;
    Ok(Database::open_in(&project, domain)?)
}

/// Project configuration, falling back to global/env config outside a project
pub fn config(global: &GlobalOpts) -> Config {
    Config::load_for(project(global).ok().as_ref())
}

/// Resolve `--format auto` against the configured default, then `fallback`
pub fn output_format(global: &GlobalOpts, config: &Config, fallback: OutputFormat) -> OutputFormat {
    if global.format != OutputFormat::Auto {
        return global.format;
    }
    config
        .default_format
        .as_deref()
        .and_then(|name| OutputFormat::from_str(name, true).ok())
        .filter(|f| *f != OutputFormat::Auto)
        .unwrap_or(fallback)
}

/// Print a success line unless `--quiet`
pub fn success(global: &GlobalOpts, message: impl std::fmt::Display) {
    if !global.quiet {
        println!("{} {}", style("✓").green(), message);
    }
}

/// Truncate a string to `max_len` characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format an amount with two decimals and the currency prefix
pub fn money(amount: f64, currency: &str) -> String {
    if amount < 0.0 {
        format!("-{}{:.2}", currency, -amount)
    } else {
        format!("{}{:.2}", currency, amount)
    }
}
