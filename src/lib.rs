//! Tally: record stores, field validation and business reports over local SQLite databases
//!
//! Four independent application areas (company, inventory, bank, clinical)
//! each keep their rows in one SQLite file. Writes go through a schema-aware
//! field assembler; reports are fixed queries rendered as tables, CSV or HTML.

pub mod cli;
pub mod core;
pub mod entities;
pub mod report;
