//! Entity catalogs and compound operations
//!
//! Tally manages four independent application areas, one database each:
//!
//! **Company** ([`company`]):
//! - Employees, monthly payroll runs and their bonus/overtime/deduction/tax adjustments
//!
//! **Inventory** ([`inventory`]):
//! - Serialised devices and their sales
//! - ERP stock: categories, suppliers, products and product sales
//!
//! **Bank** ([`bank`]):
//! - Accounts and the deposit/withdrawal/transfer ledger
//!
//! **Clinical** ([`clinical`], [`intake`]):
//! - Patients and wide biopsy records, entered page by page through an [`IntakeSession`]
//!
//! Every operation that writes more than one row runs inside a single transaction.

pub mod bank;
pub mod clinical;
pub mod company;
pub mod intake;
pub mod inventory;

pub use bank::{Transaction, TransactionKind};
pub use company::{AdjustmentKind, PayrollStatement};
pub use intake::{IntakeOutcome, IntakeSession, Page};
