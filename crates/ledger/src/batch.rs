//! Secondary adjustment files (Before / After / allocation batches).

use std::collections::BTreeMap;

use serde::Serialize;
use stockaudit_core::{AuditError, AuditResult, PartKey, Quantity, RackKey, Row};

use crate::columns::ColumnMap;

/// Per-part quantities from a correction file.
///
/// Duplicate parts are summed; parts keep their first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdjustmentBatch {
    entries: Vec<(PartKey, Quantity)>,
    #[serde(skip)]
    index: BTreeMap<PartKey, usize>,
}

impl AdjustmentBatch {
    /// Parse a batch file (row 0 = headers).
    ///
    /// A file without data rows yields an empty batch. A file with data rows of
    /// which none carries a part number fails with `NoValidData`.
    pub fn from_rows(document: &str, rows: &[Row]) -> AuditResult<Self> {
        let columns = ColumnMap::resolve(document, rows)?;
        let data_rows = data_rows(rows);

        let mut batch = AdjustmentBatch::default();
        for row in data_rows.iter() {
            if let Some(part) = columns.part_of(row) {
                batch.add(part, columns.quantity_of(row));
            }
        }

        if !data_rows.is_empty() && batch.is_empty() {
            return Err(AuditError::no_valid_data(document));
        }
        tracing::debug!(document, parts = batch.len(), "adjustment batch parsed");
        Ok(batch)
    }

    pub fn add(&mut self, part: PartKey, quantity: Quantity) {
        match self.index.get(&part) {
            Some(&slot) => self.entries[slot].1 += quantity,
            None => {
                self.index.insert(part.clone(), self.entries.len());
                self.entries.push((part, quantity));
            }
        }
    }

    pub fn get(&self, part: &PartKey) -> Option<Quantity> {
        self.index.get(part).map(|&slot| self.entries[slot].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PartKey, Quantity)> {
        self.entries.iter().map(|(p, q)| (p, *q))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(PartKey, Quantity)> for AdjustmentBatch {
    fn from_iter<I: IntoIterator<Item = (PartKey, Quantity)>>(iter: I) -> Self {
        let mut batch = AdjustmentBatch::default();
        for (part, quantity) in iter {
            batch.add(part, quantity);
        }
        batch
    }
}

/// One row of an allocation batch, optionally tagged with a target rack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RackedAdjustment {
    pub part: PartKey,
    pub rack: Option<RackKey>,
    pub quantity: Quantity,
}

impl RackedAdjustment {
    pub fn new(part: PartKey, rack: Option<RackKey>, quantity: Quantity) -> Self {
        Self {
            part,
            rack,
            quantity,
        }
    }
}

/// Ordered allocation batch. Rows are never merged: input order is the
/// tie-break for scarce stock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RackedBatch(Vec<RackedAdjustment>);

impl RackedBatch {
    pub fn new(rows: Vec<RackedAdjustment>) -> Self {
        Self(rows)
    }

    /// Parse an allocation batch; same failure rules as [`AdjustmentBatch::from_rows`].
    pub fn from_rows(document: &str, rows: &[Row]) -> AuditResult<Self> {
        let columns = ColumnMap::resolve(document, rows)?;
        let data_rows = data_rows(rows);

        let parsed: Vec<RackedAdjustment> = data_rows
            .iter()
            .filter_map(|row| {
                columns.part_of(row).map(|part| {
                    RackedAdjustment::new(part, columns.rack_of(row), columns.quantity_of(row))
                })
            })
            .collect();

        if !data_rows.is_empty() && parsed.is_empty() {
            return Err(AuditError::no_valid_data(document));
        }
        tracing::debug!(document, rows = parsed.len(), "allocation batch parsed");
        Ok(Self(parsed))
    }

    pub fn rows(&self) -> &[RackedAdjustment] {
        &self.0
    }

    /// Per-part totals, ignoring racks (what the reconciliation stage consumes).
    pub fn to_adjustment_batch(&self) -> AdjustmentBatch {
        self.0
            .iter()
            .map(|r| (r.part.clone(), r.quantity))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Data rows after the header, ignoring fully blank lines.
fn data_rows(rows: &[Row]) -> Vec<&Row> {
    rows.iter()
        .skip(1)
        .filter(|row| row.iter().any(|c| !c.is_blank()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockaudit_core::{CellValue, Field};

    fn t(s: &str) -> CellValue {
        CellValue::text(s)
    }

    fn part(s: &str) -> PartKey {
        PartKey::normalize(s).unwrap()
    }

    #[test]
    fn batch_sums_duplicates_in_first_seen_order() {
        let rows = vec![
            vec![t("Part Code"), t("Quantity")],
            vec![t("b"), t("2")],
            vec![t("a"), t("1")],
            vec![t("B "), t("3")],
        ];
        let batch = AdjustmentBatch::from_rows("before", &rows).unwrap();
        let collected: Vec<_> = batch.iter().map(|(p, q)| (p.as_str().to_string(), q)).collect();
        assert_eq!(
            collected,
            vec![("B".to_string(), Quantity::new(5.0)), ("A".to_string(), Quantity::new(1.0))]
        );
    }

    #[test]
    fn lookups_follow_the_part_index() {
        let mut batch: AdjustmentBatch = (0..500)
            .rev()
            .map(|i| (part(&format!("P{i}")), Quantity::new(1.0)))
            .collect();
        batch.add(part("p7"), Quantity::new(2.0));

        assert_eq!(batch.len(), 500);
        assert_eq!(batch.get(&part("P7")), Some(Quantity::new(3.0)));
        assert_eq!(batch.get(&part("P500")), None);
        assert_eq!(batch.iter().next().map(|(p, _)| p.as_str()), Some("P499"));
    }

    #[test]
    fn header_only_file_is_an_empty_batch() {
        let rows = vec![vec![t("Part No"), t("Qty")], vec![CellValue::Empty, t(" ")]];
        assert!(AdjustmentBatch::from_rows("before", &rows).unwrap().is_empty());
    }

    #[test]
    fn rows_without_part_numbers_are_no_valid_data() {
        let rows = vec![vec![t("Part No"), t("Qty")], vec![CellValue::Empty, t("4")]];
        assert_eq!(
            AdjustmentBatch::from_rows("after", &rows).unwrap_err(),
            AuditError::no_valid_data("after")
        );
        assert_eq!(
            RackedBatch::from_rows("after", &rows).unwrap_err(),
            AuditError::no_valid_data("after")
        );
    }

    #[test]
    fn unresolvable_columns_fail_before_parsing() {
        let rows = vec![vec![t("Code"), t("Qty")], vec![t("A"), t("1")]];
        assert_eq!(
            AdjustmentBatch::from_rows("after", &rows).unwrap_err(),
            AuditError::missing_column("after", Field::PartNumber)
        );
    }

    #[test]
    fn racked_batch_keeps_every_row_in_order() {
        let rows = vec![
            vec![t("Part No"), t("Rack"), t("Qty")],
            vec![t("x"), CellValue::Empty, t("2")],
            vec![t("x"), t("r1"), t("3")],
            vec![t("y"), t("R2"), t("1")],
        ];
        let batch = RackedBatch::from_rows("after", &rows).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.rows()[0].rack, None);
        assert_eq!(batch.rows()[1].rack, RackKey::normalize("R1"));

        let totals = batch.to_adjustment_batch();
        assert_eq!(totals.get(&part("X")), Some(Quantity::new(5.0)));
        assert_eq!(totals.len(), 2);
    }
}
