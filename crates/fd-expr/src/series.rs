//! Result series and evaluator operands.
//!
//! Undefined values are represented as `NaN` while a series is being computed
//! and become `null` when converted to polars.

use derive_more::Display;
use polars::prelude::*;

/// Element type of a [`FactorSeries`].
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Real-valued output
    Numeric,
    /// Boolean output stored as `1.0` / `0.0`
    Boolean,
}

/// A series aligned to the row index of a [`Panel`](crate::Panel).
#[derive(Debug, Clone, PartialEq)]
pub struct FactorSeries {
    values: Vec<f64>,
    kind: ValueKind,
}

impl FactorSeries {
    /// Create a numeric series.
    pub const fn numeric(values: Vec<f64>) -> Self {
        Self {
            values,
            kind: ValueKind::Numeric,
        }
    }

    /// Create a boolean series from `1.0` / `0.0` / `NaN` values.
    pub const fn boolean(values: Vec<f64>) -> Self {
        Self {
            values,
            kind: ValueKind::Boolean,
        }
    }

    /// Create a series of the given kind.
    pub const fn new(values: Vec<f64>, kind: ValueKind) -> Self {
        Self { values, kind }
    }

    /// A series of `len` copies of `value`.
    pub fn constant(value: f64, len: usize) -> Self {
        Self::numeric(vec![value; len])
    }

    /// Raw values, `NaN` where undefined.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Consume the series and return its values.
    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Element type.
    pub const fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the series has no rows.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `row`, `None` when undefined or out of range.
    pub fn get(&self, row: usize) -> Option<f64> {
        self.values.get(row).copied().filter(|v| !v.is_nan())
    }

    /// Boolean value at `row`, `None` when undefined or out of range.
    pub fn get_bool(&self, row: usize) -> Option<bool> {
        self.get(row).map(|v| v != 0.0)
    }

    /// Number of defined values.
    pub fn count_defined(&self) -> usize {
        self.values.iter().filter(|v| !v.is_nan()).count()
    }

    /// Convert into a polars series, mapping undefined values to null.
    pub fn to_series(&self, name: &str) -> Series {
        match self.kind {
            ValueKind::Numeric => {
                let values: Vec<Option<f64>> = self
                    .values
                    .iter()
                    .map(|v| (!v.is_nan()).then_some(*v))
                    .collect();
                Series::new(name.into(), values)
            }
            ValueKind::Boolean => {
                let values: Vec<Option<bool>> = self
                    .values
                    .iter()
                    .map(|v| (!v.is_nan()).then_some(*v != 0.0))
                    .collect();
                Series::new(name.into(), values)
            }
        }
    }
}

/// Evaluator operand: a scalar constant or an aligned series.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Constant broadcast against any series
    Scalar(f64),
    /// Series aligned to the panel index
    Series(FactorSeries),
}

impl Value {
    /// Materialize as a series of `len` rows, broadcasting scalars.
    pub fn into_series(self, len: usize) -> FactorSeries {
        match self {
            Self::Scalar(v) => FactorSeries::constant(v, len),
            Self::Series(s) => s,
        }
    }

    /// Scalar value, if this operand is a constant.
    pub const fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::Series(_) => None,
        }
    }
}
