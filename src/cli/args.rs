//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    bank::BankCommands, completions::CompletionsArgs, device::DeviceCommands, init::InitArgs,
    intake::IntakeArgs, payroll::PayrollCommands, record::RecordCommands, report::ReportArgs,
    schema::SchemaArgs, stock::StockCommands,
};

#[derive(Parser)]
#[command(name = "tally")]
#[command(author, version, about = "Record stores and business reports over local SQLite databases")]
#[command(long_about = "Manage company, inventory, bank and clinical records kept in local SQLite databases, and render business reports as tables, CSV or HTML.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug logging on stderr)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Project root (default: auto-detect by finding .tally/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new tally project
    Init(InitArgs),

    /// Generic record access for any table (new, list, show, edit, delete)
    #[command(subcommand)]
    Record(RecordCommands),

    /// Bank accounts: open, deposit, withdraw, transfer, balance, history
    #[command(subcommand)]
    Bank(BankCommands),

    /// Serialised devices: sell and list sales
    #[command(subcommand)]
    Device(DeviceCommands),

    /// ERP stock: sell and restock products
    #[command(subcommand)]
    Stock(StockCommands),

    /// Payroll runs and adjustments
    #[command(subcommand)]
    Payroll(PayrollCommands),

    /// Commit a clinical intake file (patient and biopsy pages)
    Intake(IntakeArgs),

    /// Generate a business report
    Report(ReportArgs),

    /// Show table metadata
    Schema(SchemaArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Automatically detect based on context (yaml for show, tsv for list)
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// CSV format (for spreadsheets)
    Csv,
    /// Markdown tables
    Md,
    /// Just IDs, one per line
    Id,
}
