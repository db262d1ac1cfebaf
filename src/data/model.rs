use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SweepDirection – forward or reverse voltage scan
// ---------------------------------------------------------------------------

/// Direction of the voltage sweep that produced a record.
///
/// `Forward` orders before `Reverse`; the best-pixel tie-break relies on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SweepDirection {
    Forward,
    Reverse,
}

impl SweepDirection {
    /// Short label used by the instrument and in legends.
    pub fn short(self) -> &'static str {
        match self {
            SweepDirection::Forward => "Fwd",
            SweepDirection::Reverse => "Rev",
        }
    }
}

impl fmt::Display for SweepDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}

// ---------------------------------------------------------------------------
// Parameter – the four instrument-reported figures of merit
// ---------------------------------------------------------------------------

/// Photovoltaic parameter reported per pixel and sweep direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Parameter {
    Jsc,
    Voc,
    Efficiency,
    FillFactor,
}

impl Parameter {
    /// All parameters in display order.
    pub const ALL: [Parameter; 4] = [
        Parameter::Jsc,
        Parameter::Voc,
        Parameter::Efficiency,
        Parameter::FillFactor,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Parameter::Jsc => "Jsc",
            Parameter::Voc => "Voc",
            Parameter::Efficiency => "Efficiency",
            Parameter::FillFactor => "Fill Factor",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Parameter::Jsc => "mA/cm²",
            Parameter::Voc => "V",
            Parameter::Efficiency | Parameter::FillFactor => "%",
        }
    }

    /// Recognise the row label of a results-block line.
    ///
    /// Matching ignores case, spaces and underscores and only looks at the
    /// prefix, so `"J_sc [mA/cm²]"` and `"Fill Factor (%)"` both resolve.
    pub fn from_label(label: &str) -> Option<Parameter> {
        let normalized: String = label
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();

        if normalized.starts_with("jsc") {
            Some(Parameter::Jsc)
        } else if normalized.starts_with("voc") {
            Some(Parameter::Voc)
        } else if normalized.starts_with("ff") || normalized.starts_with("fillfactor") {
            Some(Parameter::FillFactor)
        } else if (normalized.starts_with("eff") && !normalized.starts_with("effective"))
            || normalized.starts_with("pce")
        {
            Some(Parameter::Efficiency)
        } else {
            None
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name(), self.unit())
    }
}

// ---------------------------------------------------------------------------
// IvPoint / PixelRecord – one sweep of one pixel
// ---------------------------------------------------------------------------

/// A single sample of an I-V sweep. Either coordinate may be NaN when the
/// source cell was empty or not a number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IvPoint {
    /// Applied voltage in V.
    pub voltage: f64,
    /// Current density in mA/cm².
    pub current: f64,
}

impl IvPoint {
    pub fn is_finite(&self) -> bool {
        self.voltage.is_finite() && self.current.is_finite()
    }
}

/// Scalar results and raw curve of one pixel in one sweep direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelRecord {
    pub pixel_id: u32,
    pub direction: SweepDirection,
    /// Short-circuit current density (mA/cm²).
    pub jsc: f64,
    /// Open-circuit voltage (V).
    pub voc: f64,
    /// Power conversion efficiency (%).
    pub efficiency: f64,
    /// Fill factor (%). Instrument artefacts may push it outside [0, 100].
    pub fill_factor: f64,
    /// Samples in data-block row order.
    pub iv_curve: Vec<IvPoint>,
}

impl PixelRecord {
    pub fn value(&self, parameter: Parameter) -> f64 {
        match parameter {
            Parameter::Jsc => self.jsc,
            Parameter::Voc => self.voc,
            Parameter::Efficiency => self.efficiency,
            Parameter::FillFactor => self.fill_factor,
        }
    }

    /// Curve points with both coordinates finite.
    pub fn valid_curve(&self) -> impl Iterator<Item = &IvPoint> + '_ {
        self.iv_curve.iter().filter(|p| p.is_finite())
    }

    /// Ordering key used for pixel-then-direction iteration.
    pub fn sort_key(&self) -> (u32, SweepDirection) {
        (self.pixel_id, self.direction)
    }

    /// Display name, e.g. `Pixel 3 (Rev)`.
    pub fn display_name(&self) -> String {
        format!("Pixel {} ({})", self.pixel_id, self.direction)
    }

    /// Compare two records for the "best pixel" choice: higher efficiency
    /// wins, then lower pixel id, then forward before reverse.
    /// `Ordering::Greater` means `self` is the better record.
    pub fn rank_against(&self, other: &PixelRecord) -> Ordering {
        self.efficiency
            .total_cmp(&other.efficiency)
            .then_with(|| other.sort_key().cmp(&self.sort_key()))
    }
}

// ---------------------------------------------------------------------------
// MeasurementFile – one parsed instrument file
// ---------------------------------------------------------------------------

/// One metadata line of the header block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub key: String,
    pub value: String,
}

/// The parsed content of one instrument output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementFile {
    /// Display label; defaults to the file stem.
    pub label: String,
    /// Header metadata in source order, repeated keys kept.
    pub header: Vec<HeaderEntry>,
    /// Records in order of appearance in the results block.
    pub pixel_records: Vec<PixelRecord>,
}

impl MeasurementFile {
    /// Number of pixel records.
    pub fn len(&self) -> usize {
        self.pixel_records.len()
    }

    /// Whether the file holds no pixel records.
    pub fn is_empty(&self) -> bool {
        self.pixel_records.is_empty()
    }

    /// Value of the first header key mentioning the active area.
    pub fn active_area(&self) -> Option<&str> {
        self.header
            .iter()
            .find(|entry| entry.key.to_lowercase().contains("active area"))
            .map(|entry| entry.value.as_str())
    }

    /// Header rendered one `key: value` line per entry.
    pub fn header_text(&self) -> String {
        self.header
            .iter()
            .map(|entry| {
                if entry.value.is_empty() {
                    entry.key.clone()
                } else {
                    format!("{}: {}", entry.key, entry.value)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Records sorted by pixel id, forward before reverse.
    pub fn records_by_pixel(&self) -> Vec<&PixelRecord> {
        let mut records: Vec<&PixelRecord> = self.pixel_records.iter().collect();
        records.sort_by_key(|r| r.sort_key());
        records
    }

    /// Highest pixel id present, 0 for an empty file.
    pub fn max_pixel_id(&self) -> u32 {
        self.pixel_records
            .iter()
            .map(|r| r.pixel_id)
            .max()
            .unwrap_or(0)
    }
}
