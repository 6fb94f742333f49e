//! `tally bank` command - accounts and their ledger

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{config, money, open_database, output_format, success};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Domain;
use crate::entities::bank::{self, Transaction};

#[derive(Subcommand, Debug)]
pub enum BankCommands {
    /// Open an account
    Open(OpenArgs),

    /// Credit an account
    Deposit(AmountArgs),

    /// Debit an account
    Withdraw(AmountArgs),

    /// Move money between accounts
    Transfer(TransferArgs),

    /// Show the current balance
    Balance(AccountArgs),

    /// List ledger entries, newest first
    History(AccountArgs),
}

#[derive(clap::Args, Debug)]
pub struct OpenArgs {
    /// Account holder
    #[arg(long)]
    pub holder: String,

    /// Unique account number
    #[arg(long)]
    pub number: String,

    /// Contact email
    #[arg(long, default_value = "")]
    pub email: String,

    /// Opening balance, booked as a deposit
    #[arg(long, default_value_t = 0.0)]
    pub initial: f64,
}

#[derive(clap::Args, Debug)]
pub struct AmountArgs {
    /// Account id
    pub account: i64,

    /// Amount (positive)
    pub amount: f64,
}

#[derive(clap::Args, Debug)]
pub struct TransferArgs {
    /// Source account id
    pub from: i64,

    /// Destination account id
    pub to: i64,

    /// Amount (positive)
    pub amount: f64,
}

#[derive(clap::Args, Debug)]
pub struct AccountArgs {
    /// Account id
    pub account: i64,
}

pub fn run(cmd: BankCommands, global: &GlobalOpts) -> Result<()> {
    let mut db = open_database(global, Domain::Bank)?;
    let config = config(global);
    let currency = config.currency_symbol();

    match cmd {
        BankCommands::Open(args) => {
            let id = bank::create_account(
                &mut db,
                &args.holder,
                &args.number,
                &args.email,
                args.initial,
            )?;
            if global.format == OutputFormat::Id {
                println!("{}", id);
            } else {
                success(
                    global,
                    format!(
                        "Opened account {} for {}",
                        style(id).cyan(),
                        style(&args.holder).yellow()
                    ),
                );
            }
        }
        BankCommands::Deposit(args) => {
            let balance = bank::deposit(&mut db, args.account, args.amount)?;
            success(
                global,
                format!(
                    "Deposited {} into account {}; balance {}",
                    money(args.amount, currency),
                    style(args.account).cyan(),
                    money(balance, currency)
                ),
            );
        }
        BankCommands::Withdraw(args) => {
            let balance = bank::withdraw(&mut db, args.account, args.amount)?;
            success(
                global,
                format!(
                    "Withdrew {} from account {}; balance {}",
                    money(args.amount, currency),
                    style(args.account).cyan(),
                    money(balance, currency)
                ),
            );
        }
        BankCommands::Transfer(args) => {
            bank::transfer(&mut db, args.from, args.to, args.amount)?;
            success(
                global,
                format!(
                    "Transferred {} from account {} to account {}",
                    money(args.amount, currency),
                    style(args.from).cyan(),
                    style(args.to).cyan()
                ),
            );
        }
        BankCommands::Balance(args) => {
            let balance = bank::get_account_balance(&db, args.account)?;
            match global.format {
                OutputFormat::Json => println!("{}", serde_json::json!({ "balance": balance })),
                OutputFormat::Tsv | OutputFormat::Csv | OutputFormat::Id => {
                    println!("{:.2}", balance)
                }
                _ => println!("{}", money(balance, currency)),
            }
        }
        BankCommands::History(args) => {
            let entries = bank::get_account_transactions(&db, args.account)?;
            print_history(&entries, output_format(global, &config, OutputFormat::Tsv), currency)?;
        }
    }
    Ok(())
}

fn print_history(entries: &[Transaction], format: OutputFormat, currency: &str) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(entries).into_diagnostic()?);
        }
        OutputFormat::Yaml => print!("{}", serde_yml::to_string(&entries).into_diagnostic()?),
        OutputFormat::Id => {
            for entry in entries {
                println!("{}", entry.id);
            }
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            writer
                .write_record(["id", "kind", "amount", "balance_after", "note", "created_at"])
                .into_diagnostic()?;
            for entry in entries {
                writer
                    .write_record([
                        entry.id.to_string(),
                        entry.kind.to_string(),
                        format!("{:.2}", entry.amount),
                        format!("{:.2}", entry.balance_after),
                        entry.note.clone().unwrap_or_default(),
                        entry.created_at.clone(),
                    ])
                    .into_diagnostic()?;
            }
            writer.flush().into_diagnostic()?;
        }
        OutputFormat::Tsv | OutputFormat::Md | OutputFormat::Auto => {
            if entries.is_empty() {
                println!("No transactions.");
                return Ok(());
            }
            println!(
                "{:<6} {:<13} {:>12} {:>12} {:<20} {}",
                style("ID").bold().dim(),
                style("KIND").bold(),
                style("AMOUNT").bold(),
                style("BALANCE").bold(),
                style("DATE").bold(),
                style("NOTE").bold()
            );
            println!("{}", "-".repeat(80));
            for entry in entries {
                let signed = if entry.kind.is_credit() {
                    entry.amount
                } else {
                    -entry.amount
                };
                println!(
                    "{:<6} {:<13} {:>12} {:>12} {:<20} {}",
                    style(entry.id).cyan(),
                    entry.kind.as_str(),
                    money(signed, currency),
                    money(entry.balance_after, currency),
                    entry.created_at,
                    entry.note.as_deref().unwrap_or("")
                );
            }
        }
    }
    Ok(())
}
