//! Reconciliation Engine.
//!
//! Compares the DMS ledger with the physical count and tracks the two
//! correction stages (Before, After). Each stage transition produces a new,
//! immutable session; nothing is mutated in place.

pub mod report;
pub mod session;

pub use report::{REPORT_HEADERS, ReconciliationReport, ReconciliationRow, ReportTotals, generate_report};
pub use session::{LedgerSnapshot, ReconciliationSession, Stage, UnmatchedAfterRow};
