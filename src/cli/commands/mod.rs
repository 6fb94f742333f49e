//! CLI command implementations

pub mod bank;
pub mod completions;
pub mod device;
pub mod init;
pub mod intake;
pub mod payroll;
pub mod record;
pub mod report;
pub mod schema;
pub mod stock;
