//! Shortage/excess comparison report.

use std::collections::BTreeSet;

use serde::Serialize;
use stockaudit_core::{CellValue, PartKey, Quantity, Row};

use crate::session::LedgerSnapshot;

pub const REPORT_HEADERS: [&str; 14] = [
    "SI no",
    "PartNo",
    "Part Description",
    "DMS Stk",
    "Phy Stock",
    "Short",
    "Excess",
    "NDP",
    "MRP",
    "Shortage Value",
    "Excess Value",
    "Total NDP Value",
    "Total MRP Value",
    "Before NDP",
];

/// One part's comparison line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationRow {
    pub si_no: usize,
    pub part: PartKey,
    pub description: String,
    pub dms_qty: Quantity,
    pub physical_qty: Quantity,
    pub short: Quantity,
    pub excess: Quantity,
    pub ndp: f64,
    pub mrp: f64,
    pub shortage_value: f64,
    pub excess_value: f64,
    pub total_ndp_value: f64,
    pub total_mrp_value: f64,
    pub before_ndp: f64,
}

impl ReconciliationRow {
    fn compute(
        part: PartKey,
        description: String,
        dms_qty: Quantity,
        physical_qty: Quantity,
        ndp: f64,
        mrp: f64,
    ) -> Self {
        let short = dms_qty.saturating_sub(physical_qty);
        let excess = physical_qty.saturating_sub(dms_qty);
        Self {
            si_no: 0,
            part,
            description,
            dms_qty,
            physical_qty,
            short,
            excess,
            ndp,
            mrp,
            shortage_value: short.valued_at(ndp),
            excess_value: excess.valued_at(ndp),
            total_ndp_value: physical_qty.valued_at(ndp),
            total_mrp_value: physical_qty.valued_at(mrp),
            before_ndp: dms_qty.valued_at(ndp),
        }
    }

    fn to_cells(&self) -> Row {
        vec![
            CellValue::Number(self.si_no as f64),
            CellValue::text(self.part.as_str()),
            CellValue::text(self.description.as_str()),
            self.dms_qty.into(),
            self.physical_qty.into(),
            self.short.into(),
            self.excess.into(),
            CellValue::Number(self.ndp),
            CellValue::Number(self.mrp),
            CellValue::Number(self.shortage_value),
            CellValue::Number(self.excess_value),
            CellValue::Number(self.total_ndp_value),
            CellValue::Number(self.total_mrp_value),
            CellValue::Number(self.before_ndp),
        ]
    }
}

/// Column-wise sums of every numeric report column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportTotals {
    pub dms_qty: Quantity,
    pub physical_qty: Quantity,
    pub short: Quantity,
    pub excess: Quantity,
    pub ndp: f64,
    pub mrp: f64,
    pub shortage_value: f64,
    pub excess_value: f64,
    pub total_ndp_value: f64,
    pub total_mrp_value: f64,
    pub before_ndp: f64,
}

impl ReportTotals {
    fn accumulate(&mut self, row: &ReconciliationRow) {
        self.dms_qty += row.dms_qty;
        self.physical_qty += row.physical_qty;
        self.short += row.short;
        self.excess += row.excess;
        self.ndp += row.ndp;
        self.mrp += row.mrp;
        self.shortage_value += row.shortage_value;
        self.excess_value += row.excess_value;
        self.total_ndp_value += row.total_ndp_value;
        self.total_mrp_value += row.total_mrp_value;
        self.before_ndp += row.before_ndp;
    }

    fn to_cells(&self) -> Row {
        vec![
            CellValue::Empty,
            CellValue::text("TOTAL"),
            CellValue::Empty,
            self.dms_qty.into(),
            self.physical_qty.into(),
            self.short.into(),
            self.excess.into(),
            CellValue::Number(self.ndp),
            CellValue::Number(self.mrp),
            CellValue::Number(self.shortage_value),
            CellValue::Number(self.excess_value),
            CellValue::Number(self.total_ndp_value),
            CellValue::Number(self.total_mrp_value),
            CellValue::Number(self.before_ndp),
        ]
    }
}

/// A full comparison report: totals plus one row per part, in part order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciliationReport {
    pub totals: ReportTotals,
    pub rows: Vec<ReconciliationRow>,
}

impl ReconciliationReport {
    pub fn row(&self, part: &PartKey) -> Option<&ReconciliationRow> {
        self.rows.iter().find(|r| &r.part == part)
    }

    /// Header row, TOTAL row, then the part rows.
    pub fn to_table(&self) -> Vec<Row> {
        let mut table = Vec::with_capacity(self.rows.len() + 2);
        table.push(REPORT_HEADERS.iter().map(|h| CellValue::text(*h)).collect());
        table.push(self.totals.to_cells());
        table.extend(self.rows.iter().map(ReconciliationRow::to_cells));
        table
    }
}

/// Build the report over `dms ∪ physical ∪ info` parts.
///
/// Pure: the same snapshot always yields the same report.
pub fn generate_report(snapshot: &LedgerSnapshot) -> ReconciliationReport {
    let parts: BTreeSet<&PartKey> = snapshot
        .dms
        .keys()
        .chain(snapshot.physical_totals.keys())
        .chain(snapshot.info.keys())
        .collect();

    let mut report = ReconciliationReport::default();
    for part in parts {
        let info = snapshot.info.get(part);
        let row = ReconciliationRow::compute(
            part.clone(),
            info.and_then(|i| i.description.clone()).unwrap_or_default(),
            snapshot.dms.get(part).unwrap_or_default(),
            snapshot.physical_totals.get(part).copied().unwrap_or_default(),
            info.and_then(|i| i.ndp).unwrap_or(0.0),
            info.and_then(|i| i.mrp).unwrap_or(0.0),
        );
        report.totals.accumulate(&row);
        report.rows.push(row);
    }

    // Sequence numbers are assigned once the part list is final.
    for (i, row) in report.rows.iter_mut().enumerate() {
        row.si_no = i + 1;
    }
    report
}
