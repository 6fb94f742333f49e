//! `tally report` command - business reports
//!
//! Prints a report to the terminal, or exports it as CSV or as an HTML
//! print view. Exports run as background jobs.

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::helpers::{config, open_database, output_format, success};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::value::json_value;
use crate::core::worker;
use crate::report::{self, ReportKind, ReportTable};

#[derive(clap::Args, Debug)]
pub struct ReportArgs {
    /// Report name or slug (e.g. "low-stock-alert")
    #[arg(required_unless_present = "list")]
    pub name: Option<String>,

    /// List available reports
    #[arg(long, conflicts_with = "name")]
    pub list: bool,

    /// Export to a CSV file
    #[arg(long, value_name = "PATH")]
    pub csv: Option<PathBuf>,

    /// Write the HTML print view to a file
    #[arg(long, value_name = "PATH")]
    pub html: Option<PathBuf>,

    /// Open the HTML print view in the browser (temporary file unless --html)
    #[arg(long)]
    pub open: bool,
}

pub fn run(args: ReportArgs, global: &GlobalOpts) -> Result<()> {
    if args.list {
        return list_reports(global);
    }

    let name = args.name.as_deref().unwrap_or_default();
    let kind: ReportKind = name.parse()?;
    let db = open_database(global, kind.domain())?;
    let table = report::generate(&db, kind)?;
    let config = config(global);
    let currency = config.currency_symbol().to_string();

    if args.csv.is_none() && args.html.is_none() && !args.open {
        return print_report(&table, output_format(global, &config, OutputFormat::Tsv), &currency);
    }

    if let Some(path) = args.csv.clone() {
        let job_table = table.clone();
        let job_currency = currency.clone();
        let bom = config.csv_bom();
        let handle = worker::spawn("export csv", move || {
            report::export_csv(&job_table, &path, &job_currency, bom)
        });
        let written = handle.wait().map_err(|e| miette::miette!("{}", e))?;
        success(global, format!("Exported {}", style(written.display()).cyan()));
    }

    if args.html.is_some() || args.open {
        let job_table = table.clone();
        let job_currency = currency.clone();
        let target = args.html.clone();
        let handle = worker::spawn("render html", move || match target {
            Some(path) => report::write_html(&job_table, &path, &job_currency),
            None => report::write_html_preview(&job_table, &job_currency),
        });
        let written = handle.wait().map_err(|e| miette::miette!("{}", e))?;
        success(global, format!("Wrote {}", style(written.display()).cyan()));

        if args.open {
            let status = config.open_in_browser(&written).into_diagnostic()?;
            if !status.success() {
                return Err(miette::miette!(
                    "could not open {} ({})",
                    written.display(),
                    status
                ));
            }
        }
    }
    Ok(())
}

fn list_reports(global: &GlobalOpts) -> Result<()> {
    if global.format == OutputFormat::Json {
        let reports: Vec<_> = ReportKind::ALL
            .iter()
            .map(|k| {
                serde_json::json!({
                    "slug": k.slug(),
                    "name": k.name(),
                    "database": k.domain().as_str(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&reports).into_diagnostic()?);
        return Ok(());
    }

    println!(
        "{:<26} {:<26} {}",
        style("REPORT").bold(),
        style("NAME").bold(),
        style("DATABASE").bold()
    );
    println!("{}", "-".repeat(64));
    for kind in ReportKind::ALL {
        println!(
            "{:<26} {:<26} {}",
            style(kind.slug()).cyan(),
            kind.name(),
            kind.domain().as_str()
        );
    }
    Ok(())
}

fn print_report(table: &ReportTable, format: OutputFormat, currency: &str) -> Result<()> {
    match format {
        OutputFormat::Csv => {
            report::write_csv(table, std::io::stdout().lock(), currency, false)?;
        }
        OutputFormat::Json | OutputFormat::Yaml => {
            let rows: Vec<serde_json::Map<String, serde_json::Value>> = table
                .rows
                .iter()
                .map(|row| {
                    table
                        .headers
                        .iter()
                        .cloned()
                        .zip(row.iter().map(json_value))
                        .collect()
                })
                .collect();
            let text = if format == OutputFormat::Json {
                serde_json::to_string_pretty(&rows).into_diagnostic()? + "\n"
            } else {
                serde_yml::to_string(&rows).into_diagnostic()?
            };
            print!("{}", text);
        }
        OutputFormat::Md => println!("{}", report::render_table(table, currency, true)),
        OutputFormat::Tsv | OutputFormat::Id | OutputFormat::Auto => {
            println!("{}", style(table.title()).bold());
            if table.rows.is_empty() {
                println!("No rows.");
            } else {
                println!("{}", report::render_table(table, currency, false));
                println!("{} row(s)", style(table.rows.len()).cyan());
            }
        }
    }
    Ok(())
}
