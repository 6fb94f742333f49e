//! Error taxonomy for record stores, compound operations and reports

use miette::Diagnostic;
use rusqlite::ffi;
use thiserror::Error;

/// Result alias used across the storage layer
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by the assembler, record stores, compound operations and reports
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("invalid value for '{field}': {message}")]
    #[diagnostic(code(tally::validation))]
    Validation { field: String, message: String },

    #[error("{table} with this {column} already exists")]
    #[diagnostic(code(tally::duplicate), help("{detail}"))]
    Duplicate {
        table: String,
        column: String,
        detail: String,
    },

    #[error("{table} {id} not found")]
    #[diagnostic(code(tally::not_found))]
    NotFound { table: String, id: i64 },

    #[error("'{field}' references missing {table} row {id}")]
    #[diagnostic(code(tally::missing_parent))]
    MissingParent { field: String, table: String, id: i64 },

    #[error("cannot delete {table} {id}: {count} {child} row(s) still reference it")]
    #[diagnostic(
        code(tally::has_dependents),
        help("delete or reassign the dependent rows first")
    )]
    HasDependents {
        table: String,
        id: i64,
        child: String,
        count: i64,
    },

    #[error("{table} rows cannot be changed with '{operation}'")]
    #[diagnostic(
        code(tally::read_only),
        help("use the dedicated command that maintains the related balances")
    )]
    ReadOnly { table: String, operation: String },

    #[error("data integrity error: {0}")]
    #[diagnostic(code(tally::integrity))]
    Integrity(String),

    #[error("insufficient funds in account {account_id}: balance {balance:.2}, requested {requested:.2}")]
    #[diagnostic(code(tally::insufficient_funds))]
    InsufficientFunds {
        account_id: i64,
        balance: f64,
        requested: f64,
    },

    #[error("insufficient stock for product {product_id}: {available} available, {requested} requested")]
    #[diagnostic(code(tally::insufficient_stock))]
    InsufficientStock {
        product_id: i64,
        available: i64,
        requested: i64,
    },

    #[error("device {device_id} is already sold")]
    #[diagnostic(
        code(tally::already_sold),
        help("set resale_policy: allow in the configuration to record another sale")
    )]
    AlreadySold { device_id: i64 },

    #[error("unsupported report type: '{0}'")]
    #[diagnostic(code(tally::unsupported_report), help("run 'tally report --list' to see report names"))]
    UnsupportedReportType(String),

    #[error("configuration error: {0}")]
    #[diagnostic(code(tally::config))]
    Config(String),

    #[error(transparent)]
    #[diagnostic(code(tally::sqlite))]
    Sqlite(rusqlite::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(tally::io))]
    Io(#[from] std::io::Error),

    #[error("template error: {0}")]
    #[diagnostic(code(tally::template))]
    Template(#[from] tera::Error),

    #[error("CSV error: {0}")]
    #[diagnostic(code(tally::csv))]
    Csv(#[from] csv::Error),
}

impl StoreError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(table: &str, id: i64) -> Self {
        StoreError::NotFound {
            table: table.to_string(),
            id,
        }
    }

    /// True for UNIQUE / PRIMARY KEY violations
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate { .. })
    }

    /// Classify a failed write against `table`
    ///
    /// UNIQUE and PRIMARY KEY violations become `Duplicate`, foreign key
    /// violations become `Integrity`; everything else stays a SQLite error.
    pub fn from_write(table: &str, err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref failure, ref message) = err {
            let detail = message.clone().unwrap_or_else(|| failure.to_string());
            match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return StoreError::Duplicate {
                        table: table.to_string(),
                        column: constraint_column(&detail).unwrap_or("key").to_string(),
                        detail,
                    };
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                    return StoreError::Integrity(format!("{}: {}", table, detail));
                }
                _ => {}
            }
        }
        StoreError::Sqlite(err)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Sqlite(err)
    }
}

/// Extract the column list from "UNIQUE constraint failed: devices.serial_number"
fn constraint_column(detail: &str) -> Option<&str> {
    let (_, cols) = detail.split_once("failed: ")?;
    let first = cols.split(',').next()?.trim();
    Some(first.rsplit('.').next().unwrap_or(first))
}
