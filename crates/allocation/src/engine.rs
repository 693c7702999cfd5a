//! Allocation runs: classify, allocate, merge, apply.

use std::collections::BTreeMap;

use serde::Serialize;
use stockaudit_core::{PartKey, Quantity, RunId};
use stockaudit_ledger::{PhysicalEntry, PhysicalLedger, RackedBatch};

use crate::classify::{UnmatchedEntry, classify};
use crate::greedy::{AllocationOutcome, AllocationProblem, ProblemKind, allocate_unmatched};
use crate::running::{RunningLedger, SubtractionMap, merge_into};

/// A part that could not be fully allocated, flattened for review.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncompletePart {
    pub part: PartKey,
    pub requested: Quantity,
    pub actual: Quantity,
    /// Still unplaced after crediting the carry-over.
    pub remaining: Quantity,
    pub available: Quantity,
    /// Part of the shortfall already placed by a previous re-apply pass.
    pub carried_over: Quantity,
    pub kind: ProblemKind,
    pub problem: String,
}

impl IncompletePart {
    fn from_outcome(
        outcome: &AllocationOutcome,
        problem: &AllocationProblem,
        carried_over: Quantity,
    ) -> Self {
        Self {
            part: outcome.entry.part().clone(),
            requested: outcome.requested(),
            actual: outcome.actual_subtracted,
            remaining: outcome.remaining_qty.saturating_sub(carried_over),
            available: outcome.available_qty,
            carried_over,
            kind: problem.kind(),
            problem: problem.to_string(),
        }
    }
}

/// Everything surfaced to the caller for review after a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub mismatched_rack: Vec<UnmatchedEntry>,
    pub empty_rack: Vec<UnmatchedEntry>,
    pub part_not_found: Vec<UnmatchedEntry>,
    pub incomplete_parts: Vec<IncompletePart>,
}

/// Result of [`AllocationEngine::generate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationRun {
    pub run_id: RunId,
    /// Perfect matches plus any consumed carry-over.
    pub perfect_match_subtractions: SubtractionMap,
    pub outcomes: Vec<AllocationOutcome>,
    /// Every subtraction applied to the physical ledger.
    pub subtractions: SubtractionMap,
    /// Positions left with positive stock.
    pub final_stock: Vec<PhysicalEntry>,
    pub diagnostics: Diagnostics,
    /// Leftover quantities for a later manual re-apply pass, net of the
    /// consumed carry-over.
    pub unresolved: Vec<UnmatchedEntry>,
}

impl AllocationRun {
    pub fn problems(&self) -> impl Iterator<Item = (&UnmatchedEntry, &AllocationProblem)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.problem.as_ref().map(|p| (&o.entry, p)))
    }
}

/// Apply `subtractions` to `physical` (clamped at zero) and keep positions
/// with stock left.
pub fn apply_subtractions(
    physical: &PhysicalLedger,
    subtractions: &SubtractionMap,
) -> Vec<PhysicalEntry> {
    physical
        .entries()
        .filter_map(|entry| {
            let subtracted = subtractions.get(&entry.key()).copied().unwrap_or_default();
            let left = entry.quantity.saturating_sub(subtracted);
            (!left.is_zero()).then(|| PhysicalEntry {
                quantity: left,
                ..entry.clone()
            })
        })
        .collect()
}

/// Carried-over quantity per part.
fn carried_per_part(carried: &SubtractionMap) -> BTreeMap<PartKey, Quantity> {
    let mut per_part = BTreeMap::new();
    for (key, quantity) in carried {
        *per_part.entry(key.part.clone()).or_default() += *quantity;
    }
    per_part
}

/// Runs allocation batches against one, never-modified, physical ledger.
///
/// The only state kept between calls is the carry-over produced by
/// [`apply_unmatched`](Self::apply_unmatched): it is merged into the next
/// [`generate`](Self::generate) and then dropped.
#[derive(Debug, Clone)]
pub struct AllocationEngine {
    physical: PhysicalLedger,
    last_subtractions: SubtractionMap,
    carry_over: Option<SubtractionMap>,
}

impl AllocationEngine {
    pub fn new(physical: PhysicalLedger) -> Self {
        Self {
            physical,
            last_subtractions: SubtractionMap::new(),
            carry_over: None,
        }
    }

    pub fn physical(&self) -> &PhysicalLedger {
        &self.physical
    }

    /// Subtractions waiting to be merged into the next run.
    pub fn carry_over(&self) -> Option<&SubtractionMap> {
        self.carry_over.as_ref()
    }

    /// Allocate one batch.
    ///
    /// Perfect matches and any pending carry-over are committed first, then
    /// empty-rack entries in input order, then mismatched-rack entries in input
    /// order. The carry-over is consumed; what it placed for a part is credited
    /// against that part's leftovers before they are reported.
    pub fn generate(&mut self, batch: &RackedBatch) -> AllocationRun {
        let run_id = RunId::new();
        let classification = classify(&self.physical, batch);

        let mut perfect = classification.perfect_matches.clone();
        let mut credit = BTreeMap::new();
        if let Some(carried) = self.carry_over.take() {
            tracing::info!(run = %run_id, positions = carried.len(), "merging carried-over subtractions");
            merge_into(&mut perfect, &carried);
            credit = carried_per_part(&carried);
        }
        let mut running = RunningLedger::seeded(&self.physical, &perfect);

        let outcomes: Vec<AllocationOutcome> = classification
            .allocation_queue()
            .map(|entry| allocate_unmatched(entry, &self.physical, &mut running))
            .collect();

        let mut subtractions = perfect.clone();
        for outcome in &outcomes {
            merge_into(&mut subtractions, &outcome.subtractions);
        }
        let final_stock = apply_subtractions(&self.physical, &subtractions);

        let mut incomplete_parts = Vec::new();
        let mut unresolved = Vec::new();
        for outcome in &outcomes {
            let carried_over = match credit.get_mut(outcome.entry.part()) {
                Some(left) => {
                    let used = outcome.remaining_qty.min(*left);
                    *left = left.saturating_sub(used);
                    used
                }
                None => Quantity::ZERO,
            };
            let remaining = outcome.remaining_qty.saturating_sub(carried_over);
            if remaining.is_zero() {
                continue;
            }
            if let Some(problem) = &outcome.problem {
                incomplete_parts.push(IncompletePart::from_outcome(outcome, problem, carried_over));
            }
            unresolved.push(outcome.entry.with_quantity(remaining));
        }
        unresolved.extend(classification.part_not_found.iter().cloned());

        tracing::info!(
            run = %run_id,
            rows = batch.len(),
            perfect = perfect.len(),
            unmatched = classification.unmatched_len(),
            incomplete = incomplete_parts.len(),
            positions = final_stock.len(),
            "allocation run finished"
        );

        self.last_subtractions = subtractions.clone();
        AllocationRun {
            run_id,
            perfect_match_subtractions: perfect,
            outcomes,
            subtractions,
            final_stock,
            diagnostics: Diagnostics {
                mismatched_rack: classification.mismatched_rack,
                empty_rack: classification.empty_rack,
                part_not_found: classification.part_not_found,
                incomplete_parts,
            },
            unresolved,
        }
    }

    /// Place manually re-applied entries on the highest-stock racks.
    ///
    /// Availability is net of the last run's subtractions and of any pending
    /// carry-over. The resulting subtractions are added to the carry-over for
    /// the next [`generate`](Self::generate).
    pub fn apply_unmatched(&mut self, entries: &[UnmatchedEntry]) -> Vec<AllocationOutcome> {
        let mut committed = self.last_subtractions.clone();
        if let Some(pending) = &self.carry_over {
            merge_into(&mut committed, pending);
        }
        let mut running = RunningLedger::seeded(&self.physical, &committed);

        let mut queue: Vec<&UnmatchedEntry> = entries.iter().collect();
        queue.sort_by_key(|e| e.tier());

        let outcomes: Vec<AllocationOutcome> = queue
            .into_iter()
            .map(|entry| allocate_unmatched(entry, &self.physical, &mut running))
            .collect();

        let carry = self.carry_over.get_or_insert_with(SubtractionMap::new);
        for outcome in &outcomes {
            merge_into(carry, &outcome.subtractions);
        }
        tracing::info!(
            entries = entries.len(),
            positions = carry.len(),
            "unmatched quantities applied"
        );
        outcomes
    }
}
