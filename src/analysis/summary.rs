use serde::Serialize;
use thiserror::Error;

use crate::data::model::{MeasurementFile, Parameter, PixelRecord, SweepDirection};

// ---------------------------------------------------------------------------
// ParameterLists – one value list per parameter
// ---------------------------------------------------------------------------

/// Values of the four parameters, one entry per record, in
/// pixel-then-direction order. NaN entries are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParameterLists {
    pub jsc: Vec<f64>,
    pub voc: Vec<f64>,
    pub efficiency: Vec<f64>,
    pub fill_factor: Vec<f64>,
}

impl ParameterLists {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a PixelRecord>) -> Self {
        let mut lists = Self::default();
        for record in records {
            lists.jsc.push(record.jsc);
            lists.voc.push(record.voc);
            lists.efficiency.push(record.efficiency);
            lists.fill_factor.push(record.fill_factor);
        }
        lists
    }

    pub fn get(&self, parameter: Parameter) -> &[f64] {
        match parameter {
            Parameter::Jsc => &self.jsc,
            Parameter::Voc => &self.voc,
            Parameter::Efficiency => &self.efficiency,
            Parameter::FillFactor => &self.fill_factor,
        }
    }

    /// Number of records the lists were built from.
    pub fn len(&self) -> usize {
        self.jsc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jsc.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Per-file summary
// ---------------------------------------------------------------------------

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SummaryError {
    #[error("'{0}' contains no pixel records")]
    EmptyFile(String),
    #[error("'{0}' has no finite efficiency value")]
    NoFiniteEfficiency(String),
}

/// Parameter lists of one file: all records and each sweep direction.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DirectionalLists {
    /// All records, both directions.
    pub values: ParameterLists,
    pub forward: ParameterLists,
    pub reverse: ParameterLists,
}

impl DirectionalLists {
    pub fn of_file(file: &MeasurementFile) -> Self {
        let ordered = file.records_by_pixel();
        let of_direction = |direction: SweepDirection| {
            ParameterLists::from_records(ordered.iter().copied().filter(|r| r.direction == direction))
        };
        Self {
            values: ParameterLists::from_records(ordered.iter().copied()),
            forward: of_direction(SweepDirection::Forward),
            reverse: of_direction(SweepDirection::Reverse),
        }
    }

    /// Lists for one direction, or for both when `direction` is `None`.
    pub fn get(&self, direction: Option<SweepDirection>) -> &ParameterLists {
        match direction {
            None => &self.values,
            Some(SweepDirection::Forward) => &self.forward,
            Some(SweepDirection::Reverse) => &self.reverse,
        }
    }
}

/// Per-file parameter lists and the best-performing record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedParameterSet {
    pub label: String,
    #[serde(flatten)]
    pub lists: DirectionalLists,
    pub best_pixel: PixelRecord,
}

/// Build the parameter lists of `file` and pick its best record.
///
/// The best record has the greatest finite efficiency; ties go to the
/// lowest pixel id, then to the forward sweep.
pub fn summarize(file: &MeasurementFile) -> Result<AggregatedParameterSet, SummaryError> {
    if file.is_empty() {
        return Err(SummaryError::EmptyFile(file.label.clone()));
    }

    let best_pixel = file
        .pixel_records
        .iter()
        .filter(|r| r.efficiency.is_finite())
        .max_by(|a, b| a.rank_against(b))
        .cloned()
        .ok_or_else(|| SummaryError::NoFiniteEfficiency(file.label.clone()))?;

    Ok(AggregatedParameterSet {
        label: file.label.clone(),
        lists: DirectionalLists::of_file(file),
        best_pixel,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::IvPoint;
    use crate::data::model::SweepDirection::{Forward, Reverse};

    fn record(pixel_id: u32, direction: SweepDirection, efficiency: f64) -> PixelRecord {
        PixelRecord {
            pixel_id,
            direction,
            jsc: pixel_id as f64,
            voc: 1.0,
            efficiency,
            fill_factor: 70.0,
            iv_curve: vec![
                IvPoint { voltage: 0.0, current: 20.0 },
                IvPoint { voltage: 1.0, current: 0.0 },
            ],
        }
    }

    fn file(records: Vec<PixelRecord>) -> MeasurementFile {
        MeasurementFile {
            label: "cell".into(),
            header: Vec::new(),
            pixel_records: records,
        }
    }

    #[test]
    fn best_pixel_ties_go_to_lowest_id_then_forward() {
        let f = file(vec![
            record(1, Forward, 10.0),
            record(2, Forward, 12.5),
            record(3, Reverse, 12.5),
            record(4, Forward, 9.0),
        ]);
        let summary = summarize(&f).unwrap();
        assert_eq!(summary.best_pixel.pixel_id, 2);
        assert_eq!(summary.best_pixel.direction, Forward);

        // Same result regardless of record order.
        let mut reversed = f.clone();
        reversed.pixel_records.reverse();
        assert_eq!(summarize(&reversed).unwrap().best_pixel, summary.best_pixel);
    }

    #[test]
    fn forward_wins_a_tie_within_one_pixel() {
        let f = file(vec![record(5, Reverse, 11.0), record(5, Forward, 11.0)]);
        assert_eq!(summarize(&f).unwrap().best_pixel.direction, Forward);
    }

    #[test]
    fn lists_follow_pixel_then_direction_order() {
        let f = file(vec![
            record(2, Reverse, 4.0),
            record(1, Reverse, 2.0),
            record(2, Forward, 3.0),
            record(1, Forward, 1.0),
        ]);
        let summary = summarize(&f).unwrap();
        assert_eq!(summary.lists.values.efficiency, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(summary.lists.values.get(Parameter::Jsc), &[1.0, 1.0, 2.0, 2.0]);
        assert_eq!(summary.lists.forward.efficiency, vec![1.0, 3.0]);
        assert_eq!(summary.lists.get(Some(Reverse)).efficiency, vec![2.0, 4.0]);
        assert_eq!(summary.lists.values.len(), 4);
    }

    #[test]
    fn incomplete_pairs_are_fine() {
        let f = file(vec![record(1, Forward, 8.0), record(2, Reverse, 9.0)]);
        let summary = summarize(&f).unwrap();
        assert_eq!(summary.lists.forward.len(), 1);
        assert_eq!(summary.lists.reverse.len(), 1);
        assert_eq!(summary.best_pixel.pixel_id, 2);
    }

    #[test]
    fn nan_efficiency_is_never_best() {
        let f = file(vec![record(1, Forward, f64::NAN), record(2, Forward, 3.0)]);
        let summary = summarize(&f).unwrap();
        assert_eq!(summary.best_pixel.pixel_id, 2);
        assert!(summary.lists.values.efficiency[0].is_nan());

        let all_nan = file(vec![record(1, Forward, f64::NAN)]);
        assert_eq!(
            summarize(&all_nan),
            Err(SummaryError::NoFiniteEfficiency("cell".into()))
        );
    }

    #[test]
    fn empty_file_is_reported() {
        assert_eq!(
            summarize(&file(Vec::new())),
            Err(SummaryError::EmptyFile("cell".into()))
        );
    }
}
