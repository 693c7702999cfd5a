//! Allocation Engine and Export Projector.
//!
//! Distributes post-audit subtraction quantities across the racks holding a
//! part. Rows naming an existing `(part, rack)` are applied as-is; the rest are
//! allocated greedily against the rack with the most stock still available,
//! tracking what earlier rows of the same batch already claimed. Anything the
//! greedy pass cannot place unambiguously is reported, never guessed.

pub mod classify;
pub mod engine;
pub mod greedy;
pub mod running;
pub mod template;

pub use classify::{Classification, UnmatchedEntry, classify};
pub use engine::{AllocationEngine, AllocationRun, Diagnostics, IncompletePart, apply_subtractions};
pub use greedy::{AllocationOutcome, AllocationProblem, ProblemKind, allocate_unmatched};
pub use running::{RunningLedger, SubtractionMap};
pub use template::{TEMPLATE_HEADERS, TemplateConfig, TemplateRow, template_rows, template_table};
