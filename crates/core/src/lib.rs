//! `stockaudit-core` — shared building blocks for the stock audit pipeline.
//!
//! This crate contains **pure** primitives (no IO): normalized keys, quantities,
//! tabular cells, the error model, and the seams towards the external input
//! adapter and document exporter.

pub mod cell;
pub mod error;
pub mod field;
pub mod id;
pub mod key;
pub mod quantity;
pub mod source;

pub use cell::{CellValue, Row};
pub use error::{AuditError, AuditResult};
pub use field::Field;
pub use id::{RunId, SessionId};
pub use key::{PartKey, PartRackKey, RackKey};
pub use quantity::Quantity;
pub use source::{DocumentExporter, InMemoryExporter, InMemorySource, TabularSource};
