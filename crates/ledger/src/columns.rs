//! Header resolution.
//!
//! Only enough heuristics to find the logical fields: a case-insensitive
//! substring match against a short synonym list, synonyms tried in priority
//! order. Anything smarter belongs to the input adapter.

use stockaudit_core::{AuditError, AuditResult, CellValue, Field, PartKey, Quantity, RackKey, Row};

const PART_SYNONYMS: &[&str] = &["part no", "partno", "part number", "part code", "item"];
const QUANTITY_SYNONYMS: &[&str] = &[
    "qty",
    "quantity",
    "stock",
    "phy qty",
    "count",
    "free qty",
    "balance",
];
const NDP_SYNONYMS: &[&str] = &["ndp", "net dealer price"];
const MRP_SYNONYMS: &[&str] = &["mrp", "max retail price"];
const DESCRIPTION_SYNONYMS: &[&str] = &["description"];
const RACK_SYNONYMS: &[&str] = &["rack"];
const LOCATION_SYNONYMS: &[&str] = &["location"];

/// Column indexes of the logical fields within one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub part: usize,
    pub quantity: usize,
    pub ndp: Option<usize>,
    pub mrp: Option<usize>,
    pub description: Option<usize>,
    pub rack: Option<usize>,
    pub location: Option<usize>,
}

impl ColumnMap {
    /// Resolve the columns of `rows[0]`.
    ///
    /// Fails with `MissingColumn` when there is no header row, or when the part
    /// number or quantity column cannot be found. This is a whole-file check;
    /// individual rows are never rejected here.
    pub fn resolve(document: &str, rows: &[Row]) -> AuditResult<Self> {
        let headers: Vec<String> = rows
            .first()
            .ok_or_else(|| AuditError::missing_column(document, Field::PartNumber))?
            .iter()
            .map(|h| h.to_text().trim().to_lowercase())
            .collect();

        let mut taken: Vec<usize> = Vec::new();

        let description = find_column(&headers, DESCRIPTION_SYNONYMS, &taken);
        taken.extend(description);

        let part = find_column(&headers, PART_SYNONYMS, &taken)
            .ok_or_else(|| AuditError::missing_column(document, Field::PartNumber))?;
        taken.push(part);

        let ndp = find_column(&headers, NDP_SYNONYMS, &taken);
        taken.extend(ndp);
        let mrp = find_column(&headers, MRP_SYNONYMS, &taken);
        taken.extend(mrp);

        let quantity = find_column(&headers, QUANTITY_SYNONYMS, &taken)
            .ok_or_else(|| AuditError::missing_column(document, Field::Quantity))?;
        taken.push(quantity);

        let rack = find_column(&headers, RACK_SYNONYMS, &taken);
        taken.extend(rack);
        let location = find_column(&headers, LOCATION_SYNONYMS, &taken);

        Ok(Self {
            part,
            quantity,
            ndp,
            mrp,
            description,
            rack,
            location,
        })
    }

    pub fn part_of(&self, row: &Row) -> Option<PartKey> {
        PartKey::from_cell(cell(row, self.part))
    }

    pub fn quantity_of(&self, row: &Row) -> Quantity {
        Quantity::from_cell(cell(row, self.quantity))
    }

    pub fn rack_of(&self, row: &Row) -> Option<RackKey> {
        self.rack.and_then(|i| RackKey::from_cell(cell(row, i)))
    }

    pub fn ndp_of(&self, row: &Row) -> Option<f64> {
        self.ndp.and_then(|i| cell(row, i).as_number())
    }

    pub fn mrp_of(&self, row: &Row) -> Option<f64> {
        self.mrp.and_then(|i| cell(row, i).as_number())
    }

    pub fn description_of(&self, row: &Row) -> Option<String> {
        self.description.and_then(|i| text(row, i))
    }

    pub fn location_of(&self, row: &Row) -> Option<String> {
        self.location.and_then(|i| text(row, i))
    }
}

static EMPTY: CellValue = CellValue::Empty;

fn cell(row: &Row, index: usize) -> &CellValue {
    row.get(index).unwrap_or(&EMPTY)
}

fn text(row: &Row, index: usize) -> Option<String> {
    let value = cell(row, index).to_text();
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn find_column(headers: &[String], synonyms: &[&str], taken: &[usize]) -> Option<usize> {
    synonyms.iter().find_map(|syn| {
        headers
            .iter()
            .enumerate()
            .find(|(i, h)| !taken.contains(i) && h.contains(syn))
            .map(|(i, _)| i)
    })
}
