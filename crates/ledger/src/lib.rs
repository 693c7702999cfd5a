//! Ledger Aggregator.
//!
//! Turns raw tabular rows into normalized aggregate maps: the DMS ledger keyed
//! by part, the physical ledger keyed by `(part, rack)`, and the per-part info
//! map (description and prices). Also parses the secondary adjustment files.
//!
//! Everything here is a pure function of its inputs.

pub mod aggregate;
pub mod batch;
pub mod columns;

pub use aggregate::{
    DmsLedger, InfoMap, LedgerAggregate, PartInfo, PhysicalEntry, PhysicalLedger, aggregate,
    aggregate_physical, aggregate_sources,
};
pub use batch::{AdjustmentBatch, RackedAdjustment, RackedBatch};
pub use columns::ColumnMap;
