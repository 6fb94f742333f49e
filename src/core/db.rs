//! Domain databases: one SQLite file and one connection per application area

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use super::error::{StoreError, StoreResult};
use super::project::Project;
use super::schema::TableSchema;
use super::store::RecordStore;
use crate::entities::{bank, clinical, company, inventory};

/// Application area owning one database file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Domain {
    Company,
    Inventory,
    Bank,
    Clinical,
}

impl Domain {
    pub const ALL: [Domain; 4] = [
        Domain::Company,
        Domain::Inventory,
        Domain::Bank,
        Domain::Clinical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Company => "company",
            Domain::Inventory => "inventory",
            Domain::Bank => "bank",
            Domain::Clinical => "clinical",
        }
    }

    /// Database file name inside `.tally/`
    pub fn file_name(&self) -> &'static str {
        match self {
            Domain::Company => "company_management.db",
            Domain::Inventory => "device_inventory.db",
            Domain::Bank => "bank_system.db",
            Domain::Clinical => "Informations.db",
        }
    }

    pub fn tables(&self) -> &'static [&'static TableSchema] {
        match self {
            Domain::Company => company::TABLES,
            Domain::Inventory => inventory::TABLES,
            Domain::Bank => bank::TABLES,
            Domain::Clinical => clinical::TABLES,
        }
    }

    fn ddl(&self) -> &'static str {
        match self {
            Domain::Company => company::SCHEMA_SQL,
            Domain::Inventory => inventory::SCHEMA_SQL,
            Domain::Bank => bank::SCHEMA_SQL,
            Domain::Clinical => clinical::SCHEMA_SQL,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Domain::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StoreError::validation("domain", format!("unknown domain '{}'", s)))
    }
}

/// Find a table by name across every domain
pub fn find_table(name: &str) -> Option<(Domain, &'static TableSchema)> {
    Domain::ALL.into_iter().find_map(|domain| {
        domain
            .tables()
            .iter()
            .find(|t| t.name == name)
            .map(|t| (domain, *t))
    })
}

/// An open domain database with its schema created and verified
pub struct Database {
    conn: Connection,
    domain: Domain,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) the domain database inside a project
    pub fn open_in(project: &Project, domain: Domain) -> StoreResult<Self> {
        Self::open(&project.db_path(domain), domain)
    }

    /// Open (or create) a database file for `domain`
    pub fn open(path: &Path, domain: Domain) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let db = Self::init(conn, domain, Some(path.to_path_buf()))?;
        tracing::debug!(domain = %domain, path = %path.display(), "opened database");
        Ok(db)
    }

    /// Private in-memory database (tests, dry runs)
    pub fn open_in_memory(domain: Domain) -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?, domain, None)
    }

    fn init(conn: Connection, domain: Domain, path: Option<PathBuf>) -> StoreResult<Self> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            "#,
        )?;
        conn.execute_batch(domain.ddl())?;
        for table in domain.tables() {
            table.verify(&conn)?;
        }
        Ok(Self { conn, domain, path })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record store for one of this domain's tables
    pub fn store(&self, schema: &'static TableSchema) -> RecordStore<'_> {
        RecordStore::new(&self.conn, schema)
    }

    /// Start a write transaction that takes the database lock immediately
    pub fn transaction(&mut self) -> StoreResult<Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_every_domain_initialises_and_verifies() {
        for domain in Domain::ALL {
            let db = Database::open_in_memory(domain).unwrap();
            assert_eq!(db.domain(), domain);
            for table in domain.tables() {
                assert_eq!(db.store(table).count().unwrap(), 0, "{}", table.name);
            }
        }
    }

    #[test]
    fn test_open_is_idempotent_on_disk() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join(Domain::Bank.file_name());
        {
            let _db = Database::open(&path, Domain::Bank).unwrap();
        }
        let db = Database::open(&path, Domain::Bank).unwrap();
        assert_eq!(db.path(), Some(path.as_path()));
        assert!(path.exists());
    }

    #[test]
    fn test_find_table_and_parse_domain() {
        let (domain, table) = find_table("devices").unwrap();
        assert_eq!(domain, Domain::Inventory);
        assert_eq!(table.entity, "device");
        assert!(find_table("nope").is_none());

        assert_eq!("BANK".parse::<Domain>().unwrap(), Domain::Bank);
        assert!("payroll".parse::<Domain>().is_err());
    }

    #[test]
    fn test_table_names_are_unique_across_domains() {
        let mut names: Vec<_> = Domain::ALL
            .iter()
            .flat_map(|d| d.tables().iter().map(|t| t.name))
            .collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
    }
}
