//! Three-stage reconciliation session.
//!
//! `Initial` → `BeforeApplied` → `AfterApplied`. A session is an immutable
//! snapshot; applying a batch returns a new session and leaves `self` intact,
//! so a failed transition never disturbs the prior state.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use stockaudit_core::{AuditError, AuditResult, PartKey, Quantity, Row, SessionId};
use stockaudit_ledger::{AdjustmentBatch, DmsLedger, InfoMap, LedgerAggregate};

use crate::report::{ReconciliationReport, generate_report};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    Initial,
    BeforeApplied,
    AfterApplied,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Initial => "Initial",
            Stage::BeforeApplied => "BeforeApplied",
            Stage::AfterApplied => "AfterApplied",
        }
    }
}

impl core::fmt::Display for Stage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger maps the report is computed from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerSnapshot {
    pub dms: DmsLedger,
    /// Physical quantity per part, summed across racks.
    pub physical_totals: BTreeMap<PartKey, Quantity>,
    pub info: InfoMap,
}

impl LedgerSnapshot {
    pub fn from_aggregate(aggregate: &LedgerAggregate) -> Self {
        Self {
            dms: aggregate.dms.clone(),
            physical_totals: aggregate.physical.part_totals(),
            info: aggregate.info.clone(),
        }
    }
}

/// An After row whose part does not exist in the physical ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedAfterRow {
    pub part: PartKey,
    pub quantity: Quantity,
}

#[derive(Debug, Clone)]
pub struct ReconciliationSession {
    id: SessionId,
    stage: Stage,
    entered_at: DateTime<Utc>,
    original: Arc<LedgerSnapshot>,
    current: LedgerSnapshot,
    report: ReconciliationReport,
    ignored_before: Vec<PartKey>,
    unmatched_after: Vec<UnmatchedAfterRow>,
}

impl ReconciliationSession {
    /// Start a session from freshly aggregated ledgers (stage `Initial`).
    ///
    /// Reloading either source means building a new session from the new
    /// aggregate; there is no way to carry adjustments over.
    pub fn new(aggregate: &LedgerAggregate) -> Self {
        let snapshot = LedgerSnapshot::from_aggregate(aggregate);
        let session = Self::enter(
            Stage::Initial,
            Arc::new(snapshot.clone()),
            snapshot,
            Vec::new(),
            Vec::new(),
        );
        tracing::info!(
            session = %session.id,
            parts = session.report.rows.len(),
            "initial report generated"
        );
        session
    }

    fn enter(
        stage: Stage,
        original: Arc<LedgerSnapshot>,
        current: LedgerSnapshot,
        ignored_before: Vec<PartKey>,
        unmatched_after: Vec<UnmatchedAfterRow>,
    ) -> Self {
        let report = generate_report(&current);
        Self {
            id: SessionId::new(),
            stage,
            entered_at: Utc::now(),
            original,
            current,
            report,
            ignored_before,
            unmatched_after,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn entered_at(&self) -> DateTime<Utc> {
        self.entered_at
    }

    pub fn snapshot(&self) -> &LedgerSnapshot {
        &self.current
    }

    /// The snapshot as aggregated, before any adjustment.
    pub fn original(&self) -> &LedgerSnapshot {
        &self.original
    }

    pub fn report(&self) -> &ReconciliationReport {
        &self.report
    }

    /// Before-batch parts that were not in the original DMS ledger.
    pub fn ignored_before_parts(&self) -> &[PartKey] {
        &self.ignored_before
    }

    pub fn unmatched_after_rows(&self) -> &[UnmatchedAfterRow] {
        &self.unmatched_after
    }

    /// Apply the Before batch: reduce DMS stock of parts that were present in
    /// the original DMS ledger. Other parts are ignored, never created.
    pub fn apply_before(&self, batch: &AdjustmentBatch) -> AuditResult<Self> {
        if self.stage != Stage::Initial {
            return Err(AuditError::invalid_stage(
                self.stage.as_str(),
                "apply the Before batch",
            ));
        }

        let mut next = self.current.clone();
        let mut ignored = Vec::new();
        for (part, quantity) in batch.iter() {
            if self.original.dms.contains(part) {
                next.dms.subtract(part, quantity);
            } else {
                ignored.push(part.clone());
            }
        }

        let session = Self::enter(
            Stage::BeforeApplied,
            Arc::clone(&self.original),
            next,
            ignored,
            Vec::new(),
        );
        tracing::info!(
            session = %session.id,
            from = %self.id,
            parts = batch.len(),
            ignored = session.ignored_before.len(),
            "before batch applied"
        );
        Ok(session)
    }

    /// Apply the After batch: reduce DMS stock where the part exists, and the
    /// part's aggregate physical quantity where it exists. After rows for parts
    /// absent from the physical ledger are recorded as unmatched.
    pub fn apply_after(&self, batch: &AdjustmentBatch) -> AuditResult<Self> {
        if self.stage == Stage::AfterApplied {
            return Err(AuditError::invalid_stage(
                self.stage.as_str(),
                "apply the After batch",
            ));
        }

        let mut next = self.current.clone();
        let mut unmatched = Vec::new();
        for (part, quantity) in batch.iter() {
            next.dms.subtract(part, quantity);
            match next.physical_totals.get_mut(part) {
                Some(physical) => *physical = physical.saturating_sub(quantity),
                None => unmatched.push(UnmatchedAfterRow {
                    part: part.clone(),
                    quantity,
                }),
            }
        }

        let session = Self::enter(
            Stage::AfterApplied,
            Arc::clone(&self.original),
            next,
            self.ignored_before.clone(),
            unmatched,
        );
        if !session.unmatched_after.is_empty() {
            tracing::warn!(
                session = %session.id,
                unmatched = session.unmatched_after.len(),
                "after batch rows without physical stock"
            );
        }
        tracing::info!(session = %session.id, from = %self.id, parts = batch.len(), "after batch applied");
        Ok(session)
    }

    /// Parse and apply a Before file. Parse failures leave `self` untouched.
    pub fn apply_before_rows(&self, document: &str, rows: &[Row]) -> AuditResult<Self> {
        let batch = AdjustmentBatch::from_rows(document, rows)?;
        self.apply_before(&batch)
    }

    /// Parse and apply an After file. Parse failures leave `self` untouched.
    pub fn apply_after_rows(&self, document: &str, rows: &[Row]) -> AuditResult<Self> {
        let batch = AdjustmentBatch::from_rows(document, rows)?;
        self.apply_after(&batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use stockaudit_core::{CellValue, Field, RackKey};
    use stockaudit_ledger::{PhysicalEntry, PhysicalLedger};

    fn part(s: &str) -> PartKey {
        PartKey::normalize(s).unwrap()
    }

    fn q(v: f64) -> Quantity {
        Quantity::new(v)
    }

    fn rack(s: &str) -> Option<RackKey> {
        RackKey::normalize(s)
    }

    fn aggregate_a() -> LedgerAggregate {
        LedgerAggregate {
            dms: [(part("A"), q(10.0)), (part("B"), q(4.0))].into_iter().collect(),
            physical: [
                PhysicalEntry::new(part("A"), rack("R1"), q(4.0)),
                PhysicalEntry::new(part("A"), rack("R2"), q(3.0)),
            ]
            .into_iter()
            .collect(),
            info: InfoMap::new(),
        }
    }

    fn batch(entries: &[(&str, f64)]) -> AdjustmentBatch {
        entries.iter().map(|(p, v)| (part(p), q(*v))).collect()
    }

    #[test]
    fn initial_report_compares_dms_with_rack_totals() {
        let session = ReconciliationSession::new(&aggregate_a());
        assert_eq!(session.stage(), Stage::Initial);

        let row = session.report().row(&part("A")).unwrap();
        assert_eq!(row.dms_qty, q(10.0));
        assert_eq!(row.physical_qty, q(7.0));
        assert_eq!(row.short, q(3.0));
        assert_eq!(row.excess, Quantity::ZERO);
    }

    #[test]
    fn report_generation_is_idempotent() {
        let session = ReconciliationSession::new(&aggregate_a());
        let first = serde_json::to_string(&generate_report(session.snapshot())).unwrap();
        let second = serde_json::to_string(&generate_report(session.snapshot())).unwrap();
        assert_eq!(first, second);
        assert_eq!(session.report(), &generate_report(session.snapshot()));
    }

    #[test]
    fn before_only_touches_parts_present_in_original_dms() {
        let session = ReconciliationSession::new(&aggregate_a());
        let next = session
            .apply_before(&batch(&[("a", 12.0), ("B", 1.0), ("ZZ", 5.0)]))
            .unwrap();

        assert_eq!(next.stage(), Stage::BeforeApplied);
        assert_eq!(next.snapshot().dms.get(&part("A")), Some(Quantity::ZERO));
        assert_eq!(next.snapshot().dms.get(&part("B")), Some(q(3.0)));
        assert!(!next.snapshot().dms.contains(&part("ZZ")));
        assert!(next.report().row(&part("ZZ")).is_none());
        assert_eq!(next.ignored_before_parts(), &[part("ZZ")]);

        // The previous snapshot is untouched.
        assert_eq!(session.snapshot().dms.get(&part("A")), Some(q(10.0)));
        assert_eq!(next.original(), session.original());
    }

    #[test]
    fn after_reduces_dms_and_physical_and_records_unmatched() {
        let session = ReconciliationSession::new(&aggregate_a())
            .apply_before(&batch(&[("A", 1.0)]))
            .unwrap();
        let next = session
            .apply_after(&batch(&[("A", 5.0), ("B", 2.0), ("Q", 1.0)]))
            .unwrap();

        assert_eq!(next.stage(), Stage::AfterApplied);
        let a = next.report().row(&part("A")).unwrap();
        assert_eq!(a.dms_qty, q(4.0));
        assert_eq!(a.physical_qty, q(2.0));
        assert_eq!(next.snapshot().dms.get(&part("B")), Some(q(2.0)));

        let unmatched: Vec<&str> = next
            .unmatched_after_rows()
            .iter()
            .map(|r| r.part.as_str())
            .collect();
        assert_eq!(unmatched, vec!["B", "Q"]);
    }

    #[test]
    fn after_can_follow_initial_directly() {
        let session = ReconciliationSession::new(&aggregate_a());
        let next = session.apply_after(&batch(&[("A", 100.0)])).unwrap();
        let a = next.report().row(&part("A")).unwrap();
        assert_eq!(a.dms_qty, Quantity::ZERO);
        assert_eq!(a.physical_qty, Quantity::ZERO);
    }

    #[test]
    fn out_of_order_transitions_are_rejected() {
        let after = ReconciliationSession::new(&aggregate_a())
            .apply_after(&batch(&[("A", 1.0)]))
            .unwrap();

        let err = after.apply_before(&batch(&[("A", 1.0)])).unwrap_err();
        assert!(matches!(err, AuditError::InvalidStage { stage: "AfterApplied", .. }));
        assert!(after.apply_after(&batch(&[("A", 1.0)])).is_err());
        assert_eq!(after.stage(), Stage::AfterApplied);
    }

    #[test]
    fn unreadable_batch_file_leaves_session_unchanged() {
        let session = ReconciliationSession::new(&aggregate_a());
        let rows = vec![vec![CellValue::text("Part No"), CellValue::text("Remarks")]];
        let err = session.apply_before_rows("before.json", &rows).unwrap_err();
        assert_eq!(err, AuditError::missing_column("before.json", Field::Quantity));

        let rows = vec![
            vec![CellValue::text("Part No"), CellValue::text("Qty")],
            vec![CellValue::Empty, CellValue::Number(3.0)],
        ];
        let err = session.apply_after_rows("after.json", &rows).unwrap_err();
        assert_eq!(err, AuditError::no_valid_data("after.json"));
        assert_eq!(session.stage(), Stage::Initial);
    }

    proptest! {
        /// The report lists exactly the union of DMS, physical and info parts.
        #[test]
        fn report_covers_union_of_part_keys(
            dms in prop::collection::btree_map(0u8..20, 0u32..100, 0..10),
            physical in prop::collection::vec((0u8..20, 0u8..3, 0u32..100), 0..15),
            info in prop::collection::btree_set(0u8..20, 0..5),
        ) {
            let name = |n: u8| part(&format!("P{n}"));
            let aggregate = LedgerAggregate {
                dms: dms.iter().map(|(p, v)| (name(*p), q(f64::from(*v)))).collect(),
                physical: physical
                    .iter()
                    .map(|(p, r, v)| PhysicalEntry::new(name(*p), rack(&format!("R{r}")), q(f64::from(*v))))
                    .collect::<PhysicalLedger>(),
                info: info.iter().map(|p| (name(*p), Default::default())).collect(),
            };

            let mut expected: Vec<PartKey> = dms
                .keys()
                .chain(physical.iter().map(|(p, _, _)| p))
                .chain(info.iter())
                .map(|p| name(*p))
                .collect();
            expected.sort();
            expected.dedup();

            let session = ReconciliationSession::new(&aggregate);
            let actual: Vec<PartKey> = session.report().rows.iter().map(|r| r.part.clone()).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
