//! DMS, physical and info aggregation.

use std::collections::BTreeMap;

use serde::Serialize;
use stockaudit_core::{
    AuditResult, PartKey, PartRackKey, Quantity, RackKey, Row, TabularSource,
};

use crate::columns::ColumnMap;

pub const DMS_DOCUMENT: &str = "DMS stock";
pub const PHYSICAL_DOCUMENT: &str = "physical stock";

/// Nominal stock per part; duplicate rows are summed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DmsLedger(BTreeMap<PartKey, Quantity>);

impl DmsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, part: PartKey, quantity: Quantity) {
        *self.0.entry(part).or_default() += quantity;
    }

    pub fn get(&self, part: &PartKey) -> Option<Quantity> {
        self.0.get(part).copied()
    }

    pub fn contains(&self, part: &PartKey) -> bool {
        self.0.contains_key(part)
    }

    /// Subtract `quantity` from an existing part, clamped at zero.
    ///
    /// Returns `false` (and changes nothing) when the part is not in the ledger.
    pub fn subtract(&mut self, part: &PartKey, quantity: Quantity) -> bool {
        match self.0.get_mut(part) {
            Some(current) => {
                *current = current.saturating_sub(quantity);
                true
            }
            None => false,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &PartKey> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PartKey, Quantity)> {
        self.0.iter().map(|(k, v)| (k, *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(PartKey, Quantity)> for DmsLedger {
    fn from_iter<I: IntoIterator<Item = (PartKey, Quantity)>>(iter: I) -> Self {
        let mut ledger = DmsLedger::new();
        for (part, quantity) in iter {
            ledger.add(part, quantity);
        }
        ledger
    }
}

/// One counted `(part, rack)` position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhysicalEntry {
    pub part: PartKey,
    pub rack: Option<RackKey>,
    pub quantity: Quantity,
    pub ndp: f64,
    pub mrp: f64,
    pub description: Option<String>,
    pub location: Option<String>,
}

impl PhysicalEntry {
    pub fn new(part: PartKey, rack: Option<RackKey>, quantity: Quantity) -> Self {
        Self {
            part,
            rack,
            quantity,
            ndp: 0.0,
            mrp: 0.0,
            description: None,
            location: None,
        }
    }

    pub fn key(&self) -> PartRackKey {
        PartRackKey::new(self.part.clone(), self.rack.clone())
    }
}

/// Physical stock keyed by `(part, rack)`.
///
/// Rows sharing a key have their quantities summed; every other field keeps the
/// first occurrence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhysicalLedger(BTreeMap<PartRackKey, PhysicalEntry>);

impl PhysicalLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: PhysicalEntry) {
        match self.0.get_mut(&entry.key()) {
            Some(existing) => existing.quantity += entry.quantity,
            None => {
                self.0.insert(entry.key(), entry);
            }
        }
    }

    pub fn get(&self, key: &PartRackKey) -> Option<&PhysicalEntry> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &PartRackKey) -> bool {
        self.0.contains_key(key)
    }

    pub fn contains_part(&self, part: &PartKey) -> bool {
        self.racks_of(part).next().is_some()
    }

    /// Entries of one part, in ascending rack order.
    pub fn racks_of<'a>(&'a self, part: &'a PartKey) -> impl Iterator<Item = &'a PhysicalEntry> {
        let start = PartRackKey::new(part.clone(), None);
        self.0
            .range(start..)
            .take_while(move |(k, _)| &k.part == part)
            .map(|(_, e)| e)
    }

    pub fn part_total(&self, part: &PartKey) -> Quantity {
        self.racks_of(part).map(|e| e.quantity).sum()
    }

    /// Aggregate physical quantity per part (summed across racks).
    pub fn part_totals(&self) -> BTreeMap<PartKey, Quantity> {
        let mut totals: BTreeMap<PartKey, Quantity> = BTreeMap::new();
        for entry in self.0.values() {
            *totals.entry(entry.part.clone()).or_default() += entry.quantity;
        }
        totals
    }

    pub fn entries(&self) -> impl Iterator<Item = &PhysicalEntry> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<PhysicalEntry> for PhysicalLedger {
    fn from_iter<I: IntoIterator<Item = PhysicalEntry>>(iter: I) -> Self {
        let mut ledger = PhysicalLedger::new();
        for entry in iter {
            ledger.add(entry);
        }
        ledger
    }
}

/// Descriptive data for a part, first non-blank value wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PartInfo {
    pub description: Option<String>,
    pub ndp: Option<f64>,
    pub mrp: Option<f64>,
}

impl PartInfo {
    fn fill_from(&mut self, description: Option<String>, ndp: Option<f64>, mrp: Option<f64>) {
        if self.description.is_none() {
            self.description = description;
        }
        if self.ndp.is_none() {
            self.ndp = ndp;
        }
        if self.mrp.is_none() {
            self.mrp = mrp;
        }
    }
}

pub type InfoMap = BTreeMap<PartKey, PartInfo>;

/// Output of [`aggregate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerAggregate {
    pub dms: DmsLedger,
    pub physical: PhysicalLedger,
    pub info: InfoMap,
}

/// Build the aggregate maps from DMS and physical rows (row 0 = headers).
///
/// Rows without a part number are skipped. DMS rows feed the info map first,
/// physical rows only fill what is still missing.
pub fn aggregate(dms_rows: &[Row], physical_rows: &[Row]) -> AuditResult<LedgerAggregate> {
    let dms_columns = ColumnMap::resolve(DMS_DOCUMENT, dms_rows)?;
    let physical_columns = ColumnMap::resolve(PHYSICAL_DOCUMENT, physical_rows)?;

    let mut result = LedgerAggregate::default();
    let mut skipped = 0usize;

    for row in dms_rows.iter().skip(1) {
        let Some(part) = dms_columns.part_of(row) else {
            skipped += 1;
            continue;
        };
        result
            .info
            .entry(part.clone())
            .or_default()
            .fill_from(
                dms_columns.description_of(row),
                dms_columns.ndp_of(row),
                dms_columns.mrp_of(row),
            );
        result.dms.add(part, dms_columns.quantity_of(row));
    }

    skipped += collect_physical(
        &physical_columns,
        physical_rows,
        &mut result.physical,
        &mut result.info,
    );

    if skipped > 0 {
        tracing::debug!(skipped, "skipped rows without a part number");
    }
    tracing::info!(
        dms_parts = result.dms.len(),
        physical_positions = result.physical.len(),
        info_parts = result.info.len(),
        "ledgers aggregated"
    );

    Ok(result)
}

/// Physical ledger alone (no DMS file), as the allocation engine needs it.
pub fn aggregate_physical(physical_rows: &[Row]) -> AuditResult<PhysicalLedger> {
    let columns = ColumnMap::resolve(PHYSICAL_DOCUMENT, physical_rows)?;
    let mut physical = PhysicalLedger::new();
    let skipped = collect_physical(&columns, physical_rows, &mut physical, &mut InfoMap::new());
    if skipped > 0 {
        tracing::debug!(skipped, "skipped rows without a part number");
    }
    Ok(physical)
}

/// Adds the physical data rows to `physical` and `info`; returns how many
/// rows had no part number.
fn collect_physical(
    columns: &ColumnMap,
    rows: &[Row],
    physical: &mut PhysicalLedger,
    info: &mut InfoMap,
) -> usize {
    let mut skipped = 0;
    for row in rows.iter().skip(1) {
        let Some(part) = columns.part_of(row) else {
            skipped += 1;
            continue;
        };
        let description = columns.description_of(row);
        let ndp = columns.ndp_of(row);
        let mrp = columns.mrp_of(row);
        info.entry(part.clone())
            .or_default()
            .fill_from(description.clone(), ndp, mrp);

        physical.add(PhysicalEntry {
            part,
            rack: columns.rack_of(row),
            quantity: columns.quantity_of(row),
            ndp: ndp.unwrap_or(0.0),
            mrp: mrp.unwrap_or(0.0),
            description,
            location: columns.location_of(row),
        });
    }
    skipped
}

/// [`aggregate`] over two input adapters.
pub fn aggregate_sources(
    dms: &impl TabularSource,
    physical: &impl TabularSource,
) -> AuditResult<LedgerAggregate> {
    let dms_rows = dms.read_rows()?;
    let physical_rows = physical.read_rows()?;
    aggregate(&dms_rows, &physical_rows)
}
