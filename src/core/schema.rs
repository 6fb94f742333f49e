//! Table metadata: the authoritative column lists every write is checked against

use std::collections::BTreeSet;

use rusqlite::Connection;

use super::error::{StoreError, StoreResult};
use super::value::Record;

/// Storage kind of a column, driving how raw input is parsed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnKind {
    Text,
    Integer,
    Real,
    /// ISO calendar date (YYYY-MM-DD) stored as text
    Date,
    /// Checkbox value stored as 0/1
    Boolean,
    /// Closed set of lowercase values stored as text
    Choice(&'static [&'static str]),
}

impl ColumnKind {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Real)
    }

    pub fn label(&self) -> String {
        match self {
            ColumnKind::Text => "text".to_string(),
            ColumnKind::Integer => "integer".to_string(),
            ColumnKind::Real => "real".to_string(),
            ColumnKind::Date => "date".to_string(),
            ColumnKind::Boolean => "boolean".to_string(),
            ColumnKind::Choice(options) => format!("one of {}", options.join("|")),
        }
    }
}

/// A single column definition
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub required: bool,
    pub unique: bool,
    pub searchable: bool,
    /// Derived aggregate or timestamp, never written through the assembler
    pub managed: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Parent table referenced by this column's value
    pub references: Option<&'static str>,
}

impl ColumnDef {
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            unique: false,
            searchable: false,
            managed: false,
            min: None,
            max: None,
            references: None,
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Text)
    }

    pub const fn integer(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Integer)
    }

    pub const fn real(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Real)
    }

    pub const fn date(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Date)
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Boolean)
    }

    pub const fn choice(name: &'static str, options: &'static [&'static str]) -> Self {
        Self::new(name, ColumnKind::Choice(options))
    }

    /// `created_at` timestamp filled by SQLite
    pub const fn created_at() -> Self {
        Self::text("created_at").managed()
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub const fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    pub const fn managed(mut self) -> Self {
        self.managed = true;
        self
    }

    pub const fn non_negative(mut self) -> Self {
        self.min = Some(0.0);
        self
    }

    pub const fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub const fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub const fn references(mut self, table: &'static str) -> Self {
        self.references = Some(table);
        self
    }

    pub fn writable(&self) -> bool {
        !self.managed
    }
}

/// What happens to child rows when a parent is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    /// Refuse while children exist
    Restrict,
    /// Delete children in the same transaction
    Cascade,
}

/// A child table holding a foreign key into this table
#[derive(Debug, Clone, Copy)]
pub struct Dependent {
    pub table: &'static str,
    pub column: &'static str,
    pub on_delete: OnDelete,
}

/// Which generic operations a table accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Generic create, update and delete
    Open,
    /// Rows are created only by a compound operation; edits and deletes are generic
    CompoundCreate,
    /// Ledger rows written only by compound operations
    AppendOnly,
}

/// Default list ordering
#[derive(Debug, Clone, Copy)]
pub struct Order {
    pub column: &'static str,
    pub descending: bool,
}

impl Order {
    pub const fn newest_first() -> Self {
        Self {
            column: "created_at",
            descending: true,
        }
    }

    pub const fn by(column: &'static str) -> Self {
        Self {
            column,
            descending: false,
        }
    }
}

/// Cross-field check run against the prospective row before a write
pub type RowCheck = fn(&Record) -> StoreResult<()>;

/// Authoritative metadata for one table
#[derive(Debug)]
pub struct TableSchema {
    pub name: &'static str,
    /// Singular human label ("device", "payroll adjustment")
    pub entity: &'static str,
    pub columns: &'static [ColumnDef],
    pub order: Order,
    pub dependents: &'static [Dependent],
    pub policy: WritePolicy,
    pub check: Option<RowCheck>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        name == "id" || self.column(name).is_some()
    }

    pub fn writable_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.writable())
    }

    pub fn required_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.required && c.writable())
    }

    pub fn searchable_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.searchable)
    }

    /// `id, col_a, col_b, ...` for SELECT statements
    pub fn select_list(&self) -> String {
        std::iter::once("id")
            .chain(self.columns.iter().map(|c| c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Check that every declared column exists in the live table
    pub fn verify(&self, conn: &Connection) -> StoreResult<()> {
        let live = table_columns(conn, self.name)?;
        if live.is_empty() {
            return Err(StoreError::Integrity(format!(
                "table '{}' does not exist",
                self.name
            )));
        }
        for column in std::iter::once("id").chain(self.columns.iter().map(|c| c.name)) {
            if !live.contains(column) {
                return Err(StoreError::Integrity(format!(
                    "table '{}' is missing column '{}'",
                    self.name, column
                )));
            }
        }
        Ok(())
    }
}

/// Column names of a live table as reported by `PRAGMA table_info`
pub fn table_columns(conn: &Connection, table: &str) -> StoreResult<BTreeSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let names = rows.collect::<rusqlite::Result<BTreeSet<_>>>()?;
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    static WIDGETS: TableSchema = TableSchema {
        name: "widgets",
        entity: "widget",
        columns: &[
            ColumnDef::text("name").required().searchable(),
            ColumnDef::real("price").non_negative(),
            ColumnDef::created_at(),
        ],
        order: Order::by("name"),
        dependents: &[],
        policy: WritePolicy::Open,
        check: None,
    };

    #[test]
    fn test_column_lookup_and_select_list() {
        assert!(WIDGETS.has_column("id"));
        assert!(WIDGETS.has_column("price"));
        assert!(!WIDGETS.has_column("nope"));
        assert_eq!(WIDGETS.select_list(), "id, name, price, created_at");
        assert_eq!(WIDGETS.writable_columns().count(), 2);
        assert_eq!(WIDGETS.required_columns().count(), 1);
    }

    #[test]
    fn test_verify_detects_drift() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(WIDGETS.verify(&conn).is_err());

        conn.execute_batch(
            "CREATE TABLE widgets (id INTEGER PRIMARY KEY, name TEXT NOT NULL, price REAL);",
        )
        .unwrap();
        let err = WIDGETS.verify(&conn).unwrap_err();
        assert!(err.to_string().contains("created_at"));

        conn.execute_batch("ALTER TABLE widgets ADD COLUMN created_at TEXT;")
            .unwrap();
        WIDGETS.verify(&conn).unwrap();
    }

    #[test]
    fn test_choice_label() {
        let kind = ColumnKind::Choice(&["a", "b"]);
        assert_eq!(kind.label(), "one of a|b");
        assert!(!kind.is_numeric());
        assert!(ColumnKind::Real.is_numeric());
    }
}
