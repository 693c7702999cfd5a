//! Step 2: greedy, highest-available-first allocation of one unmatched entry.

use serde::Serialize;
use stockaudit_core::Quantity;
use stockaudit_ledger::{PhysicalEntry, PhysicalLedger};

use crate::classify::UnmatchedEntry;
use crate::running::{RunningLedger, SubtractionMap, add_subtraction};

/// Broad class of a non-fatal allocation problem.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemKind {
    /// Less was placed than requested.
    Shortfall,
    /// Placement would require an arbitrary choice between equal racks.
    Ambiguous,
}

/// Why an entry was not fully allocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum AllocationProblem {
    PartNotFound,
    NoStockAvailable,
    InsufficientTotalStock { shortfall: Quantity },
    AmbiguousRacks { racks: Vec<String>, quantity: Quantity },
    BeyondSecondTier { candidate_rack: String },
}

impl AllocationProblem {
    pub fn kind(&self) -> ProblemKind {
        match self {
            AllocationProblem::AmbiguousRacks { .. } => ProblemKind::Ambiguous,
            _ => ProblemKind::Shortfall,
        }
    }
}

impl core::fmt::Display for AllocationProblem {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AllocationProblem::PartNotFound => f.write_str("part not found"),
            AllocationProblem::NoStockAvailable => f.write_str("no stock available"),
            AllocationProblem::InsufficientTotalStock { .. } => {
                f.write_str("insufficient total stock")
            }
            AllocationProblem::AmbiguousRacks { racks, .. } => write!(
                f,
                "ambiguous: multiple racks have equal available quantity ({})",
                racks.join(", ")
            ),
            AllocationProblem::BeyondSecondTier { candidate_rack } => write!(
                f,
                "remaining could go to rack {candidate_rack} but this algorithm does not \
                 auto-distribute beyond the top two tiers"
            ),
        }
    }
}

/// What the greedy pass did with one unmatched entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationOutcome {
    pub entry: UnmatchedEntry,
    pub subtractions: SubtractionMap,
    pub actual_subtracted: Quantity,
    pub remaining_qty: Quantity,
    /// Stock of the part still available when this entry was processed.
    pub available_qty: Quantity,
    pub problem: Option<AllocationProblem>,
}

impl AllocationOutcome {
    fn unallocated(entry: &UnmatchedEntry, available: Quantity, problem: AllocationProblem) -> Self {
        Self {
            entry: entry.clone(),
            subtractions: SubtractionMap::new(),
            actual_subtracted: Quantity::ZERO,
            remaining_qty: entry.quantity(),
            available_qty: available,
            problem: Some(problem),
        }
    }

    pub fn requested(&self) -> Quantity {
        self.entry.quantity()
    }

    pub fn is_complete(&self) -> bool {
        self.problem.is_none() && self.remaining_qty.is_zero()
    }
}

/// Records subtractions for one outcome while keeping the running ledger in step.
struct Taker<'a> {
    running: &'a mut RunningLedger,
    subtractions: SubtractionMap,
    taken: Quantity,
}

impl Taker<'_> {
    fn take(&mut self, entry: &PhysicalEntry, quantity: Quantity) {
        let taken = self.running.commit(entry, quantity);
        add_subtraction(&mut self.subtractions, entry.key(), taken);
        self.taken += taken;
    }
}

/// Allocate `entry` against the racks of its part.
///
/// Availability is counted stock minus whatever `running` already holds, and
/// every subtraction made here is committed to `running`. Only the best rack
/// and, on overflow, one clear runner-up are used; a tie at the runner-up
/// tier, or an overflow that would need a third rack, is reported instead of
/// resolved.
pub fn allocate_unmatched(
    entry: &UnmatchedEntry,
    physical: &PhysicalLedger,
    running: &mut RunningLedger,
) -> AllocationOutcome {
    let requested = entry.quantity();

    let mut ranked: Vec<(&PhysicalEntry, Quantity)> = physical
        .racks_of(entry.part())
        .map(|e| (e, running.available(e)))
        .collect();
    if ranked.is_empty() {
        return AllocationOutcome::unallocated(entry, Quantity::ZERO, AllocationProblem::PartNotFound);
    }

    let total_available: Quantity = ranked.iter().map(|(_, a)| *a).sum();
    if total_available.is_zero() {
        return AllocationOutcome::unallocated(
            entry,
            Quantity::ZERO,
            AllocationProblem::NoStockAvailable,
        );
    }

    // Stable sort: equal availability keeps ascending rack order.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let mut taker = Taker {
        running,
        subtractions: SubtractionMap::new(),
        taken: Quantity::ZERO,
    };
    let (top, top_available) = ranked[0];

    let problem = if requested <= top_available {
        taker.take(top, requested);
        None
    } else {
        taker.take(top, top_available);
        let remaining = requested.saturating_sub(top_available);
        let rest: Vec<(&PhysicalEntry, Quantity)> = ranked[1..]
            .iter()
            .copied()
            .filter(|(_, a)| !a.is_zero())
            .collect();
        let combined: Quantity = rest.iter().map(|(_, a)| *a).sum();

        if combined < remaining {
            for (rack, available) in &rest {
                taker.take(rack, *available);
            }
            Some(AllocationProblem::InsufficientTotalStock {
                shortfall: remaining.saturating_sub(combined),
            })
        } else {
            let (next, next_available) = rest[0];
            let tied: Vec<String> = rest
                .iter()
                .take_while(|(_, a)| *a == next_available)
                .map(|(e, _)| e.key().rack_label().to_string())
                .collect();

            if tied.len() >= 2 && remaining <= next_available {
                Some(AllocationProblem::AmbiguousRacks {
                    racks: tied,
                    quantity: next_available,
                })
            } else if remaining <= next_available {
                taker.take(next, remaining);
                None
            } else {
                Some(AllocationProblem::BeyondSecondTier {
                    candidate_rack: next.key().rack_label().to_string(),
                })
            }
        }
    };

    let Taker {
        subtractions,
        taken,
        ..
    } = taker;
    let outcome = AllocationOutcome {
        entry: entry.clone(),
        subtractions,
        actual_subtracted: taken,
        remaining_qty: requested.saturating_sub(taken),
        available_qty: total_available,
        problem,
    };

    if let Some(problem) = &outcome.problem {
        tracing::warn!(
            part = %entry.part(),
            requested = %requested,
            allocated = %outcome.actual_subtracted,
            remaining = %outcome.remaining_qty,
            %problem,
            "allocation incomplete"
        );
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockaudit_core::{PartKey, PartRackKey, RackKey};

    fn part(s: &str) -> PartKey {
        PartKey::normalize(s).unwrap()
    }

    fn q(v: f64) -> Quantity {
        Quantity::new(v)
    }

    fn key(p: &str, r: &str) -> PartRackKey {
        PartRackKey::new(part(p), RackKey::normalize(r))
    }

    fn stock(p: &str, racks: &[(&str, f64)]) -> PhysicalLedger {
        racks
            .iter()
            .map(|(r, v)| PhysicalEntry::new(part(p), RackKey::normalize(r), q(*v)))
            .collect()
    }

    fn empty_rack(p: &str, qty: f64) -> UnmatchedEntry {
        UnmatchedEntry::EmptyRack {
            part: part(p),
            quantity: q(qty),
        }
    }

    #[test]
    fn overflow_spills_into_the_runner_up() {
        let physical = stock("X", &[("R1", 10.0), ("R2", 6.0)]);
        let mut running = RunningLedger::new();
        let outcome = allocate_unmatched(&empty_rack("X", 12.0), &physical, &mut running);

        assert_eq!(outcome.subtractions[&key("X", "R1")], q(10.0));
        assert_eq!(outcome.subtractions[&key("X", "R2")], q(2.0));
        assert_eq!(outcome.actual_subtracted, q(12.0));
        assert_eq!(outcome.remaining_qty, Quantity::ZERO);
        assert_eq!(outcome.problem, None);
        assert!(outcome.is_complete());
        assert_eq!(running.available(physical.get(&key("X", "R1")).unwrap()), Quantity::ZERO);
    }

    #[test]
    fn insufficient_stock_takes_everything_and_reports_the_rest() {
        let physical = stock("X", &[("R1", 10.0), ("R2", 6.0)]);
        let outcome = allocate_unmatched(&empty_rack("X", 20.0), &physical, &mut RunningLedger::new());

        assert_eq!(outcome.subtractions[&key("X", "R1")], q(10.0));
        assert_eq!(outcome.subtractions[&key("X", "R2")], q(6.0));
        assert_eq!(outcome.actual_subtracted, q(16.0));
        assert_eq!(outcome.remaining_qty, q(4.0));
        assert_eq!(
            outcome.problem,
            Some(AllocationProblem::InsufficientTotalStock { shortfall: q(4.0) })
        );
        assert_eq!(outcome.problem.unwrap().to_string(), "insufficient total stock");
    }

    #[test]
    fn equal_top_racks_resolve_in_rack_order() {
        let physical = stock("Y", &[("R1", 5.0), ("R2", 5.0)]);
        let outcome = allocate_unmatched(&empty_rack("Y", 8.0), &physical, &mut RunningLedger::new());

        assert_eq!(outcome.subtractions[&key("Y", "R1")], q(5.0));
        assert_eq!(outcome.subtractions[&key("Y", "R2")], q(3.0));
        assert_eq!(outcome.remaining_qty, Quantity::ZERO);
        assert_eq!(outcome.problem, None);
    }

    #[test]
    fn request_within_top_rack_uses_only_that_rack() {
        let physical = stock("Y", &[("R1", 2.0), ("R2", 9.0)]);
        let outcome = allocate_unmatched(&empty_rack("Y", 9.0), &physical, &mut RunningLedger::new());
        assert_eq!(outcome.subtractions.len(), 1);
        assert_eq!(outcome.subtractions[&key("Y", "R2")], q(9.0));
    }

    #[test]
    fn tie_at_runner_up_tier_is_flagged_not_split() {
        let physical = stock("Z", &[("R1", 10.0), ("R2", 3.0), ("R3", 3.0)]);
        let outcome = allocate_unmatched(&empty_rack("Z", 12.0), &physical, &mut RunningLedger::new());

        assert_eq!(outcome.actual_subtracted, q(10.0));
        assert_eq!(outcome.remaining_qty, q(2.0));
        let problem = outcome.problem.unwrap();
        assert_eq!(problem.kind(), ProblemKind::Ambiguous);
        assert_eq!(
            problem.to_string(),
            "ambiguous: multiple racks have equal available quantity (R2, R3)"
        );
    }

    #[test]
    fn overflow_needing_a_third_rack_is_flagged() {
        let physical = stock("Z", &[("R1", 10.0), ("R2", 3.0), ("R3", 2.0)]);
        let outcome = allocate_unmatched(&empty_rack("Z", 14.0), &physical, &mut RunningLedger::new());

        assert_eq!(outcome.actual_subtracted, q(10.0));
        assert_eq!(outcome.remaining_qty, q(4.0));
        assert_eq!(
            outcome.problem,
            Some(AllocationProblem::BeyondSecondTier {
                candidate_rack: "R2".to_string()
            })
        );
        assert_eq!(outcome.problem.unwrap().kind(), ProblemKind::Shortfall);
    }

    #[test]
    fn tie_smaller_than_remaining_is_a_third_tier_problem() {
        let physical = stock("Z", &[("R1", 10.0), ("R2", 2.0), ("R3", 2.0)]);
        let outcome = allocate_unmatched(&empty_rack("Z", 13.0), &physical, &mut RunningLedger::new());
        assert!(matches!(
            outcome.problem,
            Some(AllocationProblem::BeyondSecondTier { ref candidate_rack }) if candidate_rack == "R2"
        ));
    }

    #[test]
    fn missing_part_and_exhausted_stock_allocate_nothing() {
        let physical = stock("X", &[("R1", 1.0)]);
        let mut running = RunningLedger::new();

        let outcome = allocate_unmatched(&empty_rack("NOPE", 3.0), &physical, &mut running);
        assert_eq!(outcome.problem, Some(AllocationProblem::PartNotFound));
        assert_eq!(outcome.remaining_qty, q(3.0));
        assert_eq!(outcome.actual_subtracted, Quantity::ZERO);

        allocate_unmatched(&empty_rack("X", 1.0), &physical, &mut running);
        let outcome = allocate_unmatched(&empty_rack("X", 2.0), &physical, &mut running);
        assert_eq!(outcome.problem, Some(AllocationProblem::NoStockAvailable));
        assert_eq!(outcome.problem.unwrap().to_string(), "no stock available");
    }

    #[test]
    fn earlier_commitments_reduce_what_later_entries_see() {
        let physical = stock("X", &[("R1", 10.0), ("R2", 6.0)]);
        let mut running = RunningLedger::new();

        allocate_unmatched(&empty_rack("X", 7.0), &physical, &mut running);
        // R1 now has 3 left, R2 has 6: R2 is the best rack.
        let outcome = allocate_unmatched(&empty_rack("X", 5.0), &physical, &mut running);
        assert_eq!(outcome.available_qty, q(9.0));
        assert_eq!(outcome.subtractions[&key("X", "R2")], q(5.0));
        assert_eq!(running.planned(&key("X", "R1")), q(7.0));
        assert_eq!(running.planned(&key("X", "R2")), q(5.0));
    }
}
