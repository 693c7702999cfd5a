//! Step 1: split an allocation batch into perfect matches and unmatched rows.

use serde::Serialize;
use stockaudit_core::{PartKey, PartRackKey, Quantity, RackKey};
use stockaudit_ledger::{PhysicalLedger, RackedBatch};

use crate::running::{SubtractionMap, add_subtraction};

/// A batch row that does not name an existing `(part, rack)` position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnmatchedEntry {
    /// The row carried no rack.
    EmptyRack { part: PartKey, quantity: Quantity },
    /// The row named a rack the part is not stored in.
    MismatchedRack {
        part: PartKey,
        wrong_rack: RackKey,
        quantity: Quantity,
        available_racks: Vec<String>,
    },
    /// The part is not in the physical ledger at all.
    PartNotFound {
        part: PartKey,
        rack: Option<RackKey>,
        quantity: Quantity,
    },
}

impl UnmatchedEntry {
    pub fn part(&self) -> &PartKey {
        match self {
            UnmatchedEntry::EmptyRack { part, .. }
            | UnmatchedEntry::MismatchedRack { part, .. }
            | UnmatchedEntry::PartNotFound { part, .. } => part,
        }
    }

    pub fn quantity(&self) -> Quantity {
        match self {
            UnmatchedEntry::EmptyRack { quantity, .. }
            | UnmatchedEntry::MismatchedRack { quantity, .. }
            | UnmatchedEntry::PartNotFound { quantity, .. } => *quantity,
        }
    }

    /// Same entry, asking for a different quantity (used for leftovers).
    pub fn with_quantity(&self, quantity: Quantity) -> Self {
        let mut entry = self.clone();
        match &mut entry {
            UnmatchedEntry::EmptyRack { quantity: q, .. }
            | UnmatchedEntry::MismatchedRack { quantity: q, .. }
            | UnmatchedEntry::PartNotFound { quantity: q, .. } => *q = quantity,
        }
        entry
    }

    /// Processing tier: empty-rack rows go before mismatched-rack rows.
    pub(crate) fn tier(&self) -> u8 {
        match self {
            UnmatchedEntry::EmptyRack { .. } => 0,
            UnmatchedEntry::MismatchedRack { .. } => 1,
            UnmatchedEntry::PartNotFound { .. } => 2,
        }
    }
}

/// Result of classifying one batch against the physical ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Classification {
    pub perfect_matches: SubtractionMap,
    pub empty_rack: Vec<UnmatchedEntry>,
    pub mismatched_rack: Vec<UnmatchedEntry>,
    pub part_not_found: Vec<UnmatchedEntry>,
}

impl Classification {
    /// Entries the greedy pass handles, in processing order: every empty-rack
    /// entry in input order, then every mismatched-rack entry in input order.
    pub fn allocation_queue(&self) -> impl Iterator<Item = &UnmatchedEntry> {
        self.empty_rack.iter().chain(self.mismatched_rack.iter())
    }

    pub fn unmatched_len(&self) -> usize {
        self.empty_rack.len() + self.mismatched_rack.len() + self.part_not_found.len()
    }
}

/// Classify every row of `batch`. Zero-quantity rows are dropped.
pub fn classify(physical: &PhysicalLedger, batch: &RackedBatch) -> Classification {
    let mut result = Classification::default();

    for row in batch.rows() {
        if row.quantity.is_zero() {
            tracing::debug!(part = %row.part, "skipping zero-quantity allocation row");
            continue;
        }

        let Some(rack) = &row.rack else {
            result.empty_rack.push(UnmatchedEntry::EmptyRack {
                part: row.part.clone(),
                quantity: row.quantity,
            });
            continue;
        };

        let key = PartRackKey::new(row.part.clone(), Some(rack.clone()));
        if physical.contains(&key) {
            add_subtraction(&mut result.perfect_matches, key, row.quantity);
        } else if physical.contains_part(&row.part) {
            result.mismatched_rack.push(UnmatchedEntry::MismatchedRack {
                part: row.part.clone(),
                wrong_rack: rack.clone(),
                quantity: row.quantity,
                available_racks: physical
                    .racks_of(&row.part)
                    .map(|e| e.key().rack_label().to_string())
                    .collect(),
            });
        } else {
            result.part_not_found.push(UnmatchedEntry::PartNotFound {
                part: row.part.clone(),
                rack: Some(rack.clone()),
                quantity: row.quantity,
            });
        }
    }

    tracing::debug!(
        perfect = result.perfect_matches.len(),
        empty_rack = result.empty_rack.len(),
        mismatched_rack = result.mismatched_rack.len(),
        part_not_found = result.part_not_found.len(),
        "allocation batch classified"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockaudit_ledger::{PhysicalEntry, RackedAdjustment};

    fn part(s: &str) -> PartKey {
        PartKey::normalize(s).unwrap()
    }

    fn row(p: &str, rack: &str, qty: f64) -> RackedAdjustment {
        RackedAdjustment::new(part(p), RackKey::normalize(rack), Quantity::new(qty))
    }

    fn physical() -> PhysicalLedger {
        [
            PhysicalEntry::new(part("A"), RackKey::normalize("R1"), Quantity::new(4.0)),
            PhysicalEntry::new(part("A"), RackKey::normalize("R2"), Quantity::new(3.0)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn rows_fall_into_the_four_buckets() {
        let batch = RackedBatch::new(vec![
            row("A", "r1", 1.0),
            row("A", "R1", 2.0),
            row("A", "", 5.0),
            row("A", "R9", 1.0),
            row("Z", "R1", 1.0),
            row("Z", "", 2.0),
            row("A", "R2", 0.0),
        ]);
        let c = classify(&physical(), &batch);

        let r1 = PartRackKey::new(part("A"), RackKey::normalize("R1"));
        assert_eq!(c.perfect_matches.len(), 1);
        assert_eq!(c.perfect_matches[&r1], Quantity::new(3.0));

        assert_eq!(c.empty_rack.len(), 2);
        assert_eq!(c.empty_rack[1].part(), &part("Z"));

        assert_eq!(
            c.mismatched_rack,
            vec![UnmatchedEntry::MismatchedRack {
                part: part("A"),
                wrong_rack: RackKey::normalize("R9").unwrap(),
                quantity: Quantity::new(1.0),
                available_racks: vec!["R1".to_string(), "R2".to_string()],
            }]
        );
        assert_eq!(c.part_not_found.len(), 1);
        assert_eq!(c.unmatched_len(), 4);
    }

    #[test]
    fn queue_puts_empty_rack_rows_before_mismatched_ones() {
        let batch = RackedBatch::new(vec![
            row("A", "R9", 1.0),
            row("A", "", 2.0),
            row("A", "R8", 3.0),
            row("A", "", 4.0),
        ]);
        let c = classify(&physical(), &batch);
        let order: Vec<f64> = c.allocation_queue().map(|e| e.quantity().value()).collect();
        assert_eq!(order, vec![2.0, 4.0, 1.0, 3.0]);
    }

    #[test]
    fn with_quantity_keeps_the_variant() {
        let entry = UnmatchedEntry::PartNotFound {
            part: part("Q"),
            rack: None,
            quantity: Quantity::new(3.0),
        };
        let leftover = entry.with_quantity(Quantity::new(1.0));
        assert_eq!(leftover.quantity(), Quantity::new(1.0));
        assert!(matches!(leftover, UnmatchedEntry::PartNotFound { .. }));
    }
}
