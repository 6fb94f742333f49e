//! Bank teller ledger - accounts and their transaction history

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::core::db::Database;
use crate::core::error::{StoreError, StoreResult};
use crate::core::schema::{ColumnDef, Dependent, OnDelete, Order, TableSchema, WritePolicy};
use crate::core::store::RecordStore;
use crate::core::value::Fields;

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    holder_name TEXT NOT NULL,
    account_number TEXT NOT NULL UNIQUE,
    email TEXT,
    phone TEXT,
    balance REAL NOT NULL DEFAULT 0 CHECK (balance >= 0),
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS bank_transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    amount REAL NOT NULL CHECK (amount > 0),
    balance_after REAL NOT NULL,
    note TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_bank_transactions_account ON bank_transactions(account_id);
"#;

pub static ACCOUNTS: TableSchema = TableSchema {
    name: "accounts",
    entity: "account",
    columns: &[
        ColumnDef::text("holder_name").required().searchable(),
        ColumnDef::text("account_number").required().unique().searchable(),
        ColumnDef::text("email").searchable(),
        ColumnDef::text("phone"),
        ColumnDef::real("balance").managed(),
        ColumnDef::created_at(),
    ],
    order: Order::by("holder_name"),
    dependents: &[Dependent {
        table: "bank_transactions",
        column: "account_id",
        on_delete: OnDelete::Cascade,
    }],
    policy: WritePolicy::CompoundCreate,
    check: None,
};

pub static TRANSACTIONS: TableSchema = TableSchema {
    name: "bank_transactions",
    entity: "transaction",
    columns: &[
        ColumnDef::integer("account_id").required().references("accounts"),
        ColumnDef::choice("kind", TransactionKind::NAMES).required().searchable(),
        ColumnDef::real("amount").required().min(0.01),
        ColumnDef::real("balance_after").required().non_negative(),
        ColumnDef::text("note").searchable(),
        ColumnDef::created_at(),
    ],
    order: Order::newest_first(),
    dependents: &[],
    policy: WritePolicy::AppendOnly,
    check: None,
};

pub static TABLES: &[&TableSchema] = &[&ACCOUNTS, &TRANSACTIONS];

/// Direction of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    TransferIn,
    TransferOut,
}

impl TransactionKind {
    pub const NAMES: &'static [&'static str] =
        &["deposit", "withdrawal", "transfer_in", "transfer_out"];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::TransferIn => "transfer_in",
            TransactionKind::TransferOut => "transfer_out",
        }
    }

    /// Whether the entry adds to the balance
    pub fn is_credit(&self) -> bool {
        matches!(self, TransactionKind::Deposit | TransactionKind::TransferIn)
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(TransactionKind::Deposit),
            "withdrawal" => Ok(TransactionKind::Withdrawal),
            "transfer_in" => Ok(TransactionKind::TransferIn),
            "transfer_out" => Ok(TransactionKind::TransferOut),
            other => Err(StoreError::Integrity(format!(
                "unknown transaction kind '{}'",
                other
            ))),
        }
    }
}

/// One ledger entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: i64,
    pub account_id: i64,
    pub kind: TransactionKind,
    pub amount: f64,
    pub balance_after: f64,
    pub note: Option<String>,
    pub created_at: String,
}

/// Open an account; a positive initial balance is booked as a deposit
pub fn create_account(
    db: &mut Database,
    holder_name: &str,
    account_number: &str,
    email: &str,
    initial_balance: f64,
) -> StoreResult<i64> {
    check_amount(initial_balance, true)?;
    let fields = Fields::new()
        .with("holder_name", holder_name)
        .with("account_number", account_number)
        .with("email", email);

    let tx = db.transaction()?;
    let id = RecordStore::new(&tx, &ACCOUNTS).insert(&fields)?;
    if initial_balance > 0.0 {
        post(&tx, id, TransactionKind::Deposit, initial_balance, Some("opening balance"))?;
    }
    tx.commit()?;

    tracing::info!(account_id = id, account_number, "account opened");
    Ok(id)
}

/// Credit an account, returning the new balance
pub fn deposit(db: &mut Database, account_id: i64, amount: f64) -> StoreResult<f64> {
    check_amount(amount, false)?;
    let tx = db.transaction()?;
    let balance = post(&tx, account_id, TransactionKind::Deposit, amount, None)?;
    tx.commit()?;
    tracing::info!(account_id, amount, balance, "deposit");
    Ok(balance)
}

/// Debit an account, returning the new balance
pub fn withdraw(db: &mut Database, account_id: i64, amount: f64) -> StoreResult<f64> {
    check_amount(amount, false)?;
    let tx = db.transaction()?;
    let balance = post(&tx, account_id, TransactionKind::Withdrawal, amount, None)?;
    tx.commit()?;
    tracing::info!(account_id, amount, balance, "withdrawal");
    Ok(balance)
}

/// Move money between two accounts atomically
pub fn transfer(db: &mut Database, from: i64, to: i64, amount: f64) -> StoreResult<()> {
    check_amount(amount, false)?;
    if from == to {
        return Err(StoreError::validation("to", "cannot transfer to the same account"));
    }
    let tx = db.transaction()?;
    let out_note = format!("to account {}", to);
    let in_note = format!("from account {}", from);
    post(&tx, from, TransactionKind::TransferOut, amount, Some(&out_note))?;
    post(&tx, to, TransactionKind::TransferIn, amount, Some(&in_note))?;
    tx.commit()?;
    tracing::info!(from, to, amount, "transfer");
    Ok(())
}

pub fn get_account_balance(db: &Database, account_id: i64) -> StoreResult<f64> {
    current_balance(db.conn(), account_id)
}

/// Ledger entries for an account, newest first
pub fn get_account_transactions(db: &Database, account_id: i64) -> StoreResult<Vec<Transaction>> {
    if !db.store(&ACCOUNTS).exists(account_id)? {
        return Err(StoreError::not_found(ACCOUNTS.entity, account_id));
    }
    let mut stmt = db.conn().prepare(
        r#"SELECT id, account_id, kind, amount, balance_after, note, created_at
           FROM bank_transactions
           WHERE account_id = ?1
           ORDER BY created_at DESC, id DESC"#,
    )?;
    let rows = stmt.query_map(params![account_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, f64>(3)?,
            row.get::<_, f64>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, String>(6)?,
        ))
    })?;

    let mut transactions = Vec::new();
    for row in rows {
        let (id, account_id, kind, amount, balance_after, note, created_at) = row?;
        transactions.push(Transaction {
            id,
            account_id,
            kind: kind.parse()?,
            amount,
            balance_after,
            note,
            created_at,
        });
    }
    Ok(transactions)
}

/// Apply one entry inside an open transaction, returning the new balance
fn post(
    conn: &Connection,
    account_id: i64,
    kind: TransactionKind,
    amount: f64,
    note: Option<&str>,
) -> StoreResult<f64> {
    let balance = current_balance(conn, account_id)?;
    let new_balance = if kind.is_credit() {
        round_cents(balance + amount)
    } else {
        if amount > balance {
            return Err(StoreError::InsufficientFunds {
                account_id,
                balance,
                requested: amount,
            });
        }
        round_cents(balance - amount)
    };

    conn.execute(
        "UPDATE accounts SET balance = ?1 WHERE id = ?2",
        params![new_balance, account_id],
    )
    .map_err(|e| StoreError::from_write(ACCOUNTS.name, e))?;

    let entry = Fields::new()
        .with("account_id", account_id.to_string())
        .with("kind", kind.as_str())
        .with("amount", round_cents(amount).to_string())
        .with("balance_after", new_balance.to_string())
        .with("note", note.unwrap_or_default());
    RecordStore::new(conn, &TRANSACTIONS).insert(&entry)?;
    Ok(new_balance)
}

fn current_balance(conn: &Connection, account_id: i64) -> StoreResult<f64> {
    RecordStore::new(conn, &ACCOUNTS)
        .get(account_id)?
        .real("balance")
        .ok_or_else(|| StoreError::Integrity(format!("account {} has no balance", account_id)))
}

fn check_amount(amount: f64, allow_zero: bool) -> StoreResult<()> {
    if !amount.is_finite() || amount < 0.0 || (!allow_zero && amount == 0.0) {
        let message = if allow_zero {
            "must not be negative"
        } else {
            "must be greater than zero"
        };
        return Err(StoreError::validation("amount", message));
    }
    Ok(())
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
