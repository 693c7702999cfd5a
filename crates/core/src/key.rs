//! Normalized lookup keys.
//!
//! Part numbers and rack names are trimmed and upper-cased exactly once, at
//! construction. Every map in the pipeline is keyed by these types, so raw
//! strings never reach a lookup.

use serde::{Serialize, Serializer};

use crate::cell::CellValue;

/// Normalized part number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PartKey(String);

/// Normalized rack name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RackKey(String);

macro_rules! impl_normalized_key {
    ($t:ty) => {
        impl $t {
            /// Trim + upper-case. Returns `None` when nothing is left.
            pub fn normalize(raw: &str) -> Option<Self> {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(Self(trimmed.to_uppercase()))
                }
            }

            pub fn from_cell(cell: &CellValue) -> Option<Self> {
                Self::normalize(&cell.to_text())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

impl_normalized_key!(PartKey);
impl_normalized_key!(RackKey);

/// Composite `(part, rack)` key of the physical ledger.
///
/// Orders by part first, then rack. Serializes as `PART@RACK` so it can key
/// JSON objects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartRackKey {
    pub part: PartKey,
    pub rack: Option<RackKey>,
}

impl PartRackKey {
    pub fn new(part: PartKey, rack: Option<RackKey>) -> Self {
        Self { part, rack }
    }

    pub fn rack_label(&self) -> &str {
        self.rack.as_ref().map(RackKey::as_str).unwrap_or("")
    }
}

impl Serialize for PartRackKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl core::fmt::Display for PartRackKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{}", self.part, self.rack_label())
    }
}
