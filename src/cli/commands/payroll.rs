//! `tally payroll` command - monthly payroll runs

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{config, money, open_database, output_format, success};
use crate::cli::table::{print_record, RecordFormatter, TableConfig};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Domain;
use crate::entities::company::{self, AdjustmentKind, ADJUSTMENTS, PAYROLL};

#[derive(Subcommand, Debug)]
pub enum PayrollCommands {
    /// Open a payroll run for an employee and month at their current salary
    Run(RunArgs),

    /// Add a bonus, overtime, deduction or tax line and recompute net pay
    Adjust(AdjustArgs),

    /// Show a payroll run with its adjustments
    Show(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Employee id
    pub employee: i64,

    /// Pay period (YYYY-MM)
    pub period: String,
}

#[derive(clap::Args, Debug)]
pub struct AdjustArgs {
    /// Payroll id
    pub payroll: i64,

    /// bonus, overtime, deduction or tax
    pub kind: AdjustmentKind,

    /// Amount (non-negative; the kind sets the sign)
    pub amount: f64,

    /// Reason shown on the statement
    #[arg(long, default_value = "")]
    pub reason: String,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Payroll id
    pub payroll: i64,
}

pub fn run(cmd: PayrollCommands, global: &GlobalOpts) -> Result<()> {
    let mut db = open_database(global, Domain::Company)?;
    let config = config(global);

    match cmd {
        PayrollCommands::Run(args) => {
            let id = company::run_payroll(&mut db, args.employee, &args.period)?;
            if global.format == OutputFormat::Id {
                println!("{}", id);
            } else {
                success(
                    global,
                    format!(
                        "Payroll {} opened for employee {} ({})",
                        style(id).cyan(),
                        style(args.employee).cyan(),
                        args.period
                    ),
                );
            }
        }
        PayrollCommands::Adjust(args) => {
            let net_pay =
                company::add_adjustment(&mut db, args.payroll, args.kind, args.amount, &args.reason)?;
            success(
                global,
                format!(
                    "Added {} of {} to payroll {}; net pay {}",
                    args.kind,
                    money(args.amount, config.currency_symbol()),
                    style(args.payroll).cyan(),
                    style(money(net_pay, config.currency_symbol())).yellow()
                ),
            );
        }
        PayrollCommands::Show(args) => {
            let statement = company::payroll_statement(&db, args.payroll)?;
            match output_format(global, &config, OutputFormat::Tsv) {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&statement).into_diagnostic()?);
                }
                OutputFormat::Yaml => {
                    print!("{}", serde_yml::to_string(&statement).into_diagnostic()?);
                }
                format => {
                    print_record(&PAYROLL, &statement.payroll, format)?;
                    if !statement.adjustments.is_empty() && format != OutputFormat::Id {
                        println!();
                        RecordFormatter::new(&ADJUSTMENTS)
                            .with_columns(&["kind", "amount", "reason", "created_at"])?
                            .with_config(TableConfig::for_pipe())
                            .output(&statement.adjustments, format)?;
                    }
                }
            }
        }
    }
    Ok(())
}
