//! Export Projector: final rack stock as flat upload-template rows.

use serde::{Deserialize, Serialize};
use stockaudit_core::{CellValue, Row};
use stockaudit_ledger::PhysicalEntry;

pub const TEMPLATE_HEADERS: [&str; 10] = [
    "DEALER_ID",
    "BRANCH_ID",
    "SPARE_PART_NO",
    "MANUFACTURER_ID",
    "LOCATION_ID",
    "RACK",
    "COST",
    "TAXABLE",
    "STOCK",
    "MRP",
];

/// Identity columns stamped onto every template row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub dealer_id: String,
    pub branch_id: String,
    pub manufacturer_id: String,
    pub taxable: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            dealer_id: String::new(),
            branch_id: String::new(),
            manufacturer_id: String::new(),
            taxable: "Y".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct TemplateRow {
    pub dealer_id: String,
    pub branch_id: String,
    pub spare_part_no: String,
    pub manufacturer_id: String,
    pub location_id: String,
    pub rack: String,
    pub cost: f64,
    pub taxable: String,
    pub stock: f64,
    pub mrp: f64,
}

impl TemplateRow {
    pub fn to_cells(&self) -> Row {
        vec![
            CellValue::text(self.dealer_id.as_str()),
            CellValue::text(self.branch_id.as_str()),
            CellValue::text(self.spare_part_no.as_str()),
            CellValue::text(self.manufacturer_id.as_str()),
            CellValue::text(self.location_id.as_str()),
            CellValue::text(self.rack.as_str()),
            CellValue::Number(self.cost),
            CellValue::text(self.taxable.as_str()),
            CellValue::Number(self.stock),
            CellValue::Number(self.mrp),
        ]
    }
}

/// One row per position with positive stock; zero positions are skipped.
pub fn template_rows(config: &TemplateConfig, final_stock: &[PhysicalEntry]) -> Vec<TemplateRow> {
    final_stock
        .iter()
        .filter(|e| !e.quantity.is_zero())
        .map(|e| TemplateRow {
            dealer_id: config.dealer_id.clone(),
            branch_id: config.branch_id.clone(),
            spare_part_no: e.part.to_string(),
            manufacturer_id: config.manufacturer_id.clone(),
            location_id: e.location.clone().unwrap_or_default(),
            rack: e.key().rack_label().to_string(),
            cost: e.ndp,
            taxable: config.taxable.clone(),
            stock: e.quantity.value(),
            mrp: e.mrp,
        })
        .collect()
}

/// Header row followed by the template rows.
pub fn template_table(rows: &[TemplateRow]) -> Vec<Row> {
    let mut table = Vec::with_capacity(rows.len() + 1);
    table.push(TEMPLATE_HEADERS.iter().map(|h| CellValue::text(*h)).collect());
    table.extend(rows.iter().map(TemplateRow::to_cells));
    table
}
