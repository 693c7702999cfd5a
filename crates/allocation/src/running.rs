//! Running subtraction ledger for one allocation batch.

use std::collections::BTreeMap;

use stockaudit_core::{PartRackKey, Quantity};
use stockaudit_ledger::{PhysicalEntry, PhysicalLedger};

/// Planned subtractions per `(part, rack)`.
pub type SubtractionMap = BTreeMap<PartRackKey, Quantity>;

/// Add `quantity` under `key`, summing with what is already there.
pub(crate) fn add_subtraction(map: &mut SubtractionMap, key: PartRackKey, quantity: Quantity) {
    if !quantity.is_zero() {
        *map.entry(key).or_default() += quantity;
    }
}

pub(crate) fn merge_into(target: &mut SubtractionMap, source: &SubtractionMap) {
    for (key, quantity) in source {
        add_subtraction(target, key.clone(), *quantity);
    }
}

/// Cumulative quantity already planned per rack within one batch.
///
/// Invariant: `planned(k) <= original(k)` for every key. [`commit`] caps at the
/// available quantity, so the ledger can never claim more than was counted.
///
/// [`commit`]: RunningLedger::commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunningLedger {
    planned: SubtractionMap,
}

impl RunningLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger pre-loaded with subtractions that are already committed (capped
    /// at each rack's counted stock; keys unknown to `physical` are ignored).
    pub fn seeded(physical: &PhysicalLedger, committed: &SubtractionMap) -> Self {
        let mut ledger = Self::new();
        for (key, quantity) in committed {
            if let Some(entry) = physical.get(key) {
                ledger.commit(entry, *quantity);
            }
        }
        ledger
    }

    pub fn planned(&self, key: &PartRackKey) -> Quantity {
        self.planned.get(key).copied().unwrap_or_default()
    }

    /// Counted stock minus what is already planned.
    pub fn available(&self, entry: &PhysicalEntry) -> Quantity {
        entry.quantity.saturating_sub(self.planned(&entry.key()))
    }

    /// Plan up to `quantity` from `entry`; returns what was actually planned.
    pub fn commit(&mut self, entry: &PhysicalEntry, quantity: Quantity) -> Quantity {
        let taken = quantity.min(self.available(entry));
        add_subtraction(&mut self.planned, entry.key(), taken);
        taken
    }

    pub fn subtractions(&self) -> &SubtractionMap {
        &self.planned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockaudit_core::{PartKey, RackKey};

    fn entry(part: &str, rack: &str, qty: f64) -> PhysicalEntry {
        PhysicalEntry::new(
            PartKey::normalize(part).unwrap(),
            RackKey::normalize(rack),
            Quantity::new(qty),
        )
    }

    #[test]
    fn commit_never_exceeds_counted_stock() {
        let r1 = entry("A", "R1", 5.0);
        let mut running = RunningLedger::new();

        assert_eq!(running.commit(&r1, Quantity::new(3.0)), Quantity::new(3.0));
        assert_eq!(running.available(&r1), Quantity::new(2.0));
        assert_eq!(running.commit(&r1, Quantity::new(4.0)), Quantity::new(2.0));
        assert_eq!(running.planned(&r1.key()), Quantity::new(5.0));
        assert_eq!(running.available(&r1), Quantity::ZERO);
    }

    #[test]
    fn seeding_caps_and_skips_unknown_keys() {
        let physical: PhysicalLedger = [entry("A", "R1", 5.0)].into_iter().collect();
        let mut committed = SubtractionMap::new();
        committed.insert(entry("A", "R1", 0.0).key(), Quantity::new(9.0));
        committed.insert(entry("A", "R7", 0.0).key(), Quantity::new(1.0));

        let running = RunningLedger::seeded(&physical, &committed);
        assert_eq!(running.subtractions().len(), 1);
        assert_eq!(running.planned(&entry("A", "R1", 0.0).key()), Quantity::new(5.0));
    }
}
