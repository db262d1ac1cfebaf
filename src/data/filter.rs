use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::model::{IvPoint, Parameter};

// ---------------------------------------------------------------------------
// Range predicate: which values count per parameter
// ---------------------------------------------------------------------------

/// Inclusive acceptance range. Missing bounds are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    #[serde(
        default = "neg_infinity",
        serialize_with = "serialize_bound",
        deserialize_with = "lower_bound"
    )]
    pub min: f64,
    #[serde(
        default = "infinity",
        serialize_with = "serialize_bound",
        deserialize_with = "upper_bound"
    )]
    pub max: f64,
}

fn neg_infinity() -> f64 {
    f64::NEG_INFINITY
}

fn infinity() -> f64 {
    f64::INFINITY
}

// JSON has no infinities; an unbounded side is written as `null`.

fn serialize_bound<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_some(value)
    } else {
        serializer.serialize_none()
    }
}

fn lower_bound<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NEG_INFINITY))
}

fn upper_bound<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
}

impl ValueRange {
    pub const UNBOUNDED: ValueRange = ValueRange {
        min: f64::NEG_INFINITY,
        max: f64::INFINITY,
    };

    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// NaN is never contained.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl Default for ValueRange {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

/// Per-parameter acceptance ranges plus the voltage window applied to
/// I-V curves before display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRanges {
    pub jsc: ValueRange,
    pub voc: ValueRange,
    pub efficiency: ValueRange,
    pub fill_factor: ValueRange,
    pub voltage: ValueRange,
}

impl Default for FilterRanges {
    fn default() -> Self {
        Self {
            jsc: ValueRange::UNBOUNDED,
            voc: ValueRange::UNBOUNDED,
            efficiency: ValueRange::new(0.0, 100.0),
            fill_factor: ValueRange::new(0.0, 100.0),
            voltage: ValueRange::UNBOUNDED,
        }
    }
}

impl FilterRanges {
    /// Filters that let every value through.
    pub fn unbounded() -> Self {
        Self {
            jsc: ValueRange::UNBOUNDED,
            voc: ValueRange::UNBOUNDED,
            efficiency: ValueRange::UNBOUNDED,
            fill_factor: ValueRange::UNBOUNDED,
            voltage: ValueRange::UNBOUNDED,
        }
    }

    pub fn range(&self, parameter: Parameter) -> &ValueRange {
        match parameter {
            Parameter::Jsc => &self.jsc,
            Parameter::Voc => &self.voc,
            Parameter::Efficiency => &self.efficiency,
            Parameter::FillFactor => &self.fill_factor,
        }
    }

    /// Return `values` with every out-of-range entry replaced by NaN.
    ///
    /// The length is preserved so positions still line up with pixels.
    pub fn apply(&self, parameter: Parameter, values: &[f64]) -> Vec<f64> {
        let range = self.range(parameter);
        values
            .iter()
            .map(|&v| if range.contains(v) { v } else { f64::NAN })
            .collect()
    }

    /// Curve points that are finite and inside the voltage window.
    pub fn curve_points(&self, curve: &[IvPoint]) -> Vec<IvPoint> {
        curve
            .iter()
            .filter(|p| p.is_finite() && self.voltage.contains(p.voltage))
            .copied()
            .collect()
    }
}
