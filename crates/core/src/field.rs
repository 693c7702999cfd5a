//! Logical fields the pipeline must find in tabular input.

use serde::Serialize;

/// A required column, independent of the header text used by a given file.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    PartNumber,
    Quantity,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::PartNumber => "part number",
            Field::Quantity => "quantity",
        }
    }
}

impl core::fmt::Display for Field {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
