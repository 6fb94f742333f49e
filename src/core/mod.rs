//! Core module - storage engine and project plumbing

pub mod assembler;
pub mod config;
pub mod db;
pub mod error;
pub mod project;
pub mod schema;
pub mod store;
pub mod value;
pub mod worker;

pub use assembler::{assemble, Assembled, WriteMode};
pub use config::{Config, ResalePolicy};
pub use db::{find_table, Database, Domain};
pub use error::{StoreError, StoreResult};
pub use project::{Project, ProjectError};
pub use schema::{ColumnDef, ColumnKind, TableSchema, WritePolicy};
pub use store::{RecordStore, SearchOptions};
pub use value::{Fields, Record};
