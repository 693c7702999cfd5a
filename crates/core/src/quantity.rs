//! Non-negative stock quantity.

use core::cmp::Ordering;
use core::ops::{Add, AddAssign};

use serde::Serialize;

use crate::cell::CellValue;

/// A finite, non-negative stock quantity.
///
/// Fractional units are allowed (oils, cables sold by length). Construction
/// clamps anything negative or non-finite to zero and subtraction saturates, so
/// a `Quantity` can never go below zero.
#[derive(Debug, Copy, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Quantity(f64);

impl Quantity {
    pub const ZERO: Quantity = Quantity(0.0);

    pub fn new(value: f64) -> Self {
        if value.is_finite() && value > 0.0 {
            Self(value)
        } else {
            Self::ZERO
        }
    }

    /// Reads a quantity cell; unparsable or blank cells count as zero.
    pub fn from_cell(cell: &CellValue) -> Self {
        cell.as_number().map(Self::new).unwrap_or(Self::ZERO)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0.0
    }

    pub fn saturating_sub(self, rhs: Quantity) -> Quantity {
        Quantity::new(self.0 - rhs.0)
    }

    /// Monetary value of this quantity at `unit_price`.
    pub fn valued_at(self, unit_price: f64) -> f64 {
        self.0 * unit_price
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Quantity {}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Add for Quantity {
    type Output = Quantity;

    fn add(self, rhs: Quantity) -> Quantity {
        Quantity::new(self.0 + rhs.0)
    }
}

impl AddAssign for Quantity {
    fn add_assign(&mut self, rhs: Quantity) {
        *self = *self + rhs;
    }
}

impl core::iter::Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Quantity {
        iter.fold(Quantity::ZERO, Add::add)
    }
}

impl<'a> core::iter::Sum<&'a Quantity> for Quantity {
    fn sum<I: Iterator<Item = &'a Quantity>>(iter: I) -> Quantity {
        iter.copied().sum()
    }
}

impl From<Quantity> for CellValue {
    fn from(value: Quantity) -> Self {
        CellValue::Number(value.0)
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&CellValue::Number(self.0).to_text())
    }
}
