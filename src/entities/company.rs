//! Company entities - employees, payroll runs and payroll adjustments

use rusqlite::types::Value;
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::core::db::Database;
use crate::core::error::{StoreError, StoreResult};
use crate::core::schema::{ColumnDef, Dependent, OnDelete, Order, TableSchema, WritePolicy};
use crate::core::store::RecordStore;
use crate::core::value::{Fields, Record};

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS employees (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    employee_code TEXT NOT NULL UNIQUE,
    full_name TEXT NOT NULL,
    department TEXT,
    position TEXT,
    salary REAL NOT NULL CHECK (salary >= 0),
    hire_date TEXT,
    email TEXT,
    phone TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS payroll (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    employee_id INTEGER NOT NULL REFERENCES employees(id),
    period TEXT NOT NULL,
    base_salary REAL NOT NULL DEFAULT 0,
    adjustments_total REAL NOT NULL DEFAULT 0,
    net_pay REAL NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (employee_id, period)
);

CREATE TABLE IF NOT EXISTS payroll_adjustments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    payroll_id INTEGER NOT NULL REFERENCES payroll(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    amount REAL NOT NULL CHECK (amount >= 0),
    reason TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_payroll_adjustments_payroll ON payroll_adjustments(payroll_id);
"#;

pub static EMPLOYEES: TableSchema = TableSchema {
    name: "employees",
    entity: "employee",
    columns: &[
        ColumnDef::text("employee_code").required().unique().searchable(),
        ColumnDef::text("full_name").required().searchable(),
        ColumnDef::text("department").searchable(),
        ColumnDef::text("position").searchable(),
        ColumnDef::real("salary").required().non_negative(),
        ColumnDef::date("hire_date"),
        ColumnDef::text("email").searchable(),
        ColumnDef::text("phone"),
        ColumnDef::created_at(),
    ],
    order: Order::by("full_name"),
    dependents: &[Dependent {
        table: "payroll",
        column: "employee_id",
        on_delete: OnDelete::Restrict,
    }],
    policy: WritePolicy::Open,
    check: None,
};

pub static PAYROLL: TableSchema = TableSchema {
    name: "payroll",
    entity: "payroll",
    columns: &[
        ColumnDef::integer("employee_id").required().references("employees"),
        ColumnDef::text("period").required().searchable(),
        ColumnDef::real("base_salary").managed(),
        ColumnDef::real("adjustments_total").managed(),
        ColumnDef::real("net_pay").managed(),
        ColumnDef::created_at(),
    ],
    order: Order::newest_first(),
    dependents: &[Dependent {
        table: "payroll_adjustments",
        column: "payroll_id",
        on_delete: OnDelete::Cascade,
    }],
    policy: WritePolicy::CompoundCreate,
    check: Some(check_period),
};

pub static ADJUSTMENTS: TableSchema = TableSchema {
    name: "payroll_adjustments",
    entity: "payroll adjustment",
    columns: &[
        ColumnDef::integer("payroll_id").required().references("payroll"),
        ColumnDef::choice("kind", AdjustmentKind::NAMES).required().searchable(),
        ColumnDef::real("amount").required().non_negative(),
        ColumnDef::text("reason").searchable(),
        ColumnDef::created_at(),
    ],
    order: Order::newest_first(),
    dependents: &[],
    policy: WritePolicy::AppendOnly,
    check: None,
};

pub static TABLES: &[&TableSchema] = &[&EMPLOYEES, &PAYROLL, &ADJUSTMENTS];

/// Payroll adjustment categories; bonus and overtime add, deduction and tax subtract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentKind {
    Bonus,
    Overtime,
    Deduction,
    Tax,
}

impl AdjustmentKind {
    pub const NAMES: &'static [&'static str] = &["bonus", "overtime", "deduction", "tax"];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentKind::Bonus => "bonus",
            AdjustmentKind::Overtime => "overtime",
            AdjustmentKind::Deduction => "deduction",
            AdjustmentKind::Tax => "tax",
        }
    }

    /// Sign applied to the amount when totalling
    pub fn sign(&self) -> f64 {
        match self {
            AdjustmentKind::Bonus | AdjustmentKind::Overtime => 1.0,
            AdjustmentKind::Deduction | AdjustmentKind::Tax => -1.0,
        }
    }
}

impl std::fmt::Display for AdjustmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AdjustmentKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bonus" => Ok(AdjustmentKind::Bonus),
            "overtime" => Ok(AdjustmentKind::Overtime),
            "deduction" => Ok(AdjustmentKind::Deduction),
            "tax" => Ok(AdjustmentKind::Tax),
            other => Err(StoreError::validation(
                "kind",
                format!("'{}' is not one of {}", other, Self::NAMES.join("|")),
            )),
        }
    }
}

/// A payroll row with its adjustments, newest first
#[derive(Debug, Serialize)]
pub struct PayrollStatement {
    pub payroll: Record,
    pub adjustments: Vec<Record>,
}

fn check_period(row: &Record) -> StoreResult<()> {
    let Some(period) = row.text("period") else {
        return Ok(());
    };
    let valid = period.len() == 7
        && period.as_bytes()[4] == b'-'
        && period[..4].chars().all(|c| c.is_ascii_digit())
        && matches!(period[5..].parse::<u32>(), Ok(1..=12));
    if !valid {
        return Err(StoreError::validation(
            "period",
            format!("'{}' is not a month (YYYY-MM)", period),
        ));
    }
    Ok(())
}

/// Open a payroll run for one employee and month at their current salary
pub fn run_payroll(db: &mut Database, employee_id: i64, period: &str) -> StoreResult<i64> {
    let tx = db.transaction()?;
    let employee = RecordStore::new(&tx, &EMPLOYEES).get(employee_id)?;
    let salary = employee.real("salary").unwrap_or(0.0);

    let fields = Fields::new()
        .with("employee_id", employee_id.to_string())
        .with("period", period);
    let payroll_id = RecordStore::new(&tx, &PAYROLL).insert(&fields)?;
    tx.execute(
        "UPDATE payroll SET base_salary = ?1, adjustments_total = 0, net_pay = ?1 WHERE id = ?2",
        params![salary, payroll_id],
    )?;
    tx.commit()?;

    tracing::info!(employee_id, period, payroll_id, "payroll run");
    Ok(payroll_id)
}

/// Record an adjustment and recompute the payroll's totals, returning the new net pay
pub fn add_adjustment(
    db: &mut Database,
    payroll_id: i64,
    kind: AdjustmentKind,
    amount: f64,
    reason: &str,
) -> StoreResult<f64> {
    let tx = db.transaction()?;
    let fields = Fields::new()
        .with("payroll_id", payroll_id.to_string())
        .with("kind", kind.as_str())
        .with("amount", amount.to_string())
        .with("reason", reason);
    RecordStore::new(&tx, &ADJUSTMENTS).insert(&fields)?;
    let net_pay = recompute(&tx, payroll_id)?;
    tx.commit()?;

    tracing::info!(payroll_id, kind = %kind, amount, net_pay, "payroll adjusted");
    Ok(net_pay)
}

/// Payroll row plus its adjustments
pub fn payroll_statement(db: &Database, payroll_id: i64) -> StoreResult<PayrollStatement> {
    let payroll = db.store(&PAYROLL).get(payroll_id)?;
    let adjustments = db
        .store(&ADJUSTMENTS)
        .filter_by("payroll_id", &Value::Integer(payroll_id))?;
    Ok(PayrollStatement {
        payroll,
        adjustments,
    })
}

fn recompute(conn: &Connection, payroll_id: i64) -> StoreResult<f64> {
    let mut stmt =
        conn.prepare("SELECT kind, amount FROM payroll_adjustments WHERE payroll_id = ?1")?;
    let rows = stmt.query_map(params![payroll_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
    })?;

    let mut total = 0.0;
    for row in rows {
        let (kind, amount) = row?;
        let kind: AdjustmentKind = kind.parse()?;
        total += kind.sign() * amount;
    }
    let total = (total * 100.0).round() / 100.0;

    let base: f64 = conn.query_row(
        "SELECT base_salary FROM payroll WHERE id = ?1",
        params![payroll_id],
        |row| row.get(0),
    )?;
    let net_pay = ((base + total) * 100.0).round() / 100.0;
    if net_pay < 0.0 {
        return Err(StoreError::validation(
            "amount",
            format!("net pay would become negative ({:.2})", net_pay),
        ));
    }

    conn.execute(
        "UPDATE payroll SET adjustments_total = ?1, net_pay = ?2 WHERE id = ?3",
        params![total, net_pay, payroll_id],
    )?;
    Ok(net_pay)
}
