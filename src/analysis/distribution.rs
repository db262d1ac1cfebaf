//! Boxplot statistics for one parameter across files.
//!
//! Quartiles use linear interpolation between order statistics (the
//! quantile `p` sits at position `p * (n - 1)` of the sorted values), the
//! same convention common plotting libraries use for boxplots. Fences lie
//! 1.5 IQR beyond the quartiles, whiskers end at the most extreme values
//! still inside the fences, and anything strictly outside is an outlier.

use serde::Serialize;

use crate::data::model::SweepDirection;

/// Multiplier applied to the IQR to place the fences.
pub const WHISKER_FACTOR: f64 = 1.5;

/// Whether enough values were available for a full summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistributionStatus {
    Complete,
    /// Fewer than two finite values; the summary is degenerate.
    InsufficientData,
}

/// Boxplot-ready statistics of one value list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionSummary {
    /// Finite values the statistics were computed from.
    pub count: usize,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub iqr: f64,
    /// Q1 - 1.5 IQR
    pub lower_fence: f64,
    /// Q3 + 1.5 IQR
    pub upper_fence: f64,
    /// Smallest value not below the lower fence.
    pub whisker_low: f64,
    /// Largest value not above the upper fence.
    pub whisker_high: f64,
    /// Values strictly outside the fences, ascending.
    pub outliers: Vec<f64>,
    pub status: DistributionStatus,
}

/// Quantile of already sorted values, `p` in `[0, 1]`.
///
/// Returns `None` for an empty slice or `p` outside `[0, 1]`.
pub fn quantile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&p) {
        return None;
    }
    let rank = p * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    Some(sorted[lower] + fraction * (sorted[upper] - sorted[lower]))
}

impl DistributionSummary {
    /// Summarise `values`. NaN and infinite entries are ignored; the
    /// caller's slice is not modified.
    pub fn from_values(values: &[f64]) -> Self {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        sorted.sort_by(f64::total_cmp);

        match sorted.as_slice() {
            [] => Self::empty(),
            [only] => Self::single(*only),
            _ => Self::from_sorted(&sorted),
        }
    }

    fn empty() -> Self {
        Self {
            count: 0,
            q1: f64::NAN,
            median: f64::NAN,
            q3: f64::NAN,
            iqr: f64::NAN,
            lower_fence: f64::NAN,
            upper_fence: f64::NAN,
            whisker_low: f64::NAN,
            whisker_high: f64::NAN,
            outliers: Vec::new(),
            status: DistributionStatus::InsufficientData,
        }
    }

    fn single(value: f64) -> Self {
        Self {
            count: 1,
            q1: value,
            median: value,
            q3: value,
            iqr: 0.0,
            lower_fence: value,
            upper_fence: value,
            whisker_low: value,
            whisker_high: value,
            outliers: Vec::new(),
            status: DistributionStatus::InsufficientData,
        }
    }

    fn from_sorted(sorted: &[f64]) -> Self {
        // `sorted` holds at least two finite values here.
        let q1 = quantile(sorted, 0.25).unwrap_or(f64::NAN);
        let median = quantile(sorted, 0.5).unwrap_or(f64::NAN);
        let q3 = quantile(sorted, 0.75).unwrap_or(f64::NAN);
        let iqr = q3 - q1;
        let lower_fence = q1 - WHISKER_FACTOR * iqr;
        let upper_fence = q3 + WHISKER_FACTOR * iqr;

        let inside = |v: &&f64| **v >= lower_fence && **v <= upper_fence;
        // The quartiles always lie inside the fences, so both finds succeed.
        let whisker_low = sorted.iter().find(inside).copied().unwrap_or(q1);
        let whisker_high = sorted.iter().rev().find(inside).copied().unwrap_or(q3);
        let outliers = sorted
            .iter()
            .copied()
            .filter(|v| *v < lower_fence || *v > upper_fence)
            .collect();

        Self {
            count: sorted.len(),
            q1,
            median,
            q3,
            iqr,
            lower_fence,
            upper_fence,
            whisker_low,
            whisker_high,
            outliers,
            status: DistributionStatus::Complete,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        self.status == DistributionStatus::InsufficientData
    }
}

// ---------------------------------------------------------------------------
// Cross-file fan-out
// ---------------------------------------------------------------------------

/// One named input list, typically one file's values of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledValues {
    pub label: String,
    /// Set when the values come from one sweep direction only.
    pub direction: Option<SweepDirection>,
    pub values: Vec<f64>,
}

impl LabeledValues {
    pub fn new(label: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            direction: None,
            values,
        }
    }

    pub fn with_direction(mut self, direction: SweepDirection) -> Self {
        self.direction = Some(direction);
        self
    }
}

/// Summary of one named input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledSummary {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<SweepDirection>,
    pub summary: DistributionSummary,
}

impl LabeledSummary {
    /// Legend text, e.g. `cell A (Rev)`.
    pub fn display_label(&self) -> String {
        match self.direction {
            Some(direction) => format!("{} ({direction})", self.label),
            None => self.label.clone(),
        }
    }
}

/// Summarise every input independently, preserving input order.
pub fn compute(per_file_values: &[LabeledValues]) -> Vec<LabeledSummary> {
    per_file_values
        .iter()
        .map(|input| LabeledSummary {
            label: input.label.clone(),
            direction: input.direction,
            summary: DistributionSummary::from_values(&input.values),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-10
    }

    #[test]
    fn quartiles_interpolate_between_ranks() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let s = DistributionSummary::from_values(&values);

        assert!(close(s.q1, 3.25));
        assert!(close(s.median, 5.5));
        assert!(close(s.q3, 7.75));
        assert!(close(s.iqr, 4.5));
        assert!(close(s.lower_fence, -3.5));
        assert!(close(s.upper_fence, 14.5));
        assert_eq!(s.whisker_low, 1.0);
        assert_eq!(s.whisker_high, 10.0);
        assert!(s.outliers.is_empty());
        assert_eq!(s.status, DistributionStatus::Complete);
        assert_eq!(s.count, 10);
    }

    #[test]
    fn far_value_is_an_outlier_and_whisker_stops_at_data() {
        let s = DistributionSummary::from_values(&[1.0, 2.0, 3.0, 4.0, 5.0, 100.0]);

        assert!(close(s.q1, 2.25));
        assert!(close(s.q3, 4.75));
        assert!(close(s.upper_fence, 8.5));
        assert_eq!(s.outliers, vec![100.0]);
        assert_eq!(s.whisker_high, 5.0);
        assert_eq!(s.whisker_low, 1.0);
    }

    #[test]
    fn outliers_on_both_sides_are_ascending() {
        let s = DistributionSummary::from_values(&[50.0, 10.0, 11.0, -40.0, 12.0, 13.0, 12.5, 11.5]);
        assert_eq!(s.outliers, vec![-40.0, 50.0]);
        assert_eq!(s.whisker_low, 10.0);
        assert_eq!(s.whisker_high, 13.0);
    }

    #[test]
    fn input_order_does_not_matter_and_input_is_untouched() {
        let values = vec![9.0, 1.0, 5.0, 3.0, 7.0];
        let s = DistributionSummary::from_values(&values);
        assert_eq!(values, vec![9.0, 1.0, 5.0, 3.0, 7.0]);
        assert_eq!(s.median, 5.0);
        assert_eq!(s.q1, 3.0);
        assert_eq!(s.q3, 7.0);
    }

    #[test]
    fn single_value_is_degenerate() {
        let s = DistributionSummary::from_values(&[4.2]);
        assert_eq!(s.q1, 4.2);
        assert_eq!(s.median, 4.2);
        assert_eq!(s.q3, 4.2);
        assert_eq!(s.iqr, 0.0);
        assert_eq!(s.whisker_low, 4.2);
        assert_eq!(s.whisker_high, 4.2);
        assert!(s.outliers.is_empty());
        assert!(s.is_insufficient());
    }

    #[test]
    fn empty_input_is_flagged() {
        let s = DistributionSummary::from_values(&[]);
        assert_eq!(s.count, 0);
        assert!(s.median.is_nan());
        assert!(s.outliers.is_empty());
        assert!(s.is_insufficient());
    }

    #[test]
    fn nan_values_are_excluded() {
        let s = DistributionSummary::from_values(&[f64::NAN, 2.0, f64::NAN, 4.0]);
        assert_eq!(s.count, 2);
        assert_eq!(s.median, 3.0);
        assert_eq!(s.status, DistributionStatus::Complete);

        let s = DistributionSummary::from_values(&[f64::NAN, 7.0]);
        assert_eq!(s.count, 1);
        assert!(s.is_insufficient());
    }

    #[test]
    fn quantile_rejects_bad_input() {
        assert_eq!(quantile(&[], 0.5), None);
        assert_eq!(quantile(&[1.0, 2.0], 1.5), None);
        assert_eq!(quantile(&[1.0, 2.0], 1.0), Some(2.0));
    }

    #[test]
    fn compute_keeps_input_order() {
        let inputs = vec![
            LabeledValues::new("zeta", vec![1.0, 2.0, 3.0]),
            LabeledValues::new("alpha", vec![]),
            LabeledValues::new("mid", vec![5.0]),
        ];
        let out = compute(&inputs);
        let labels: Vec<&str> = out.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["zeta", "alpha", "mid"]);
        assert_eq!(out[0].summary.median, 2.0);
        assert!(out[1].summary.is_insufficient());
        assert_eq!(out[2].summary.median, 5.0);
    }

    #[test]
    fn direction_is_carried_into_the_label() {
        let out = compute(&[
            LabeledValues::new("cell", vec![1.0, 2.0]).with_direction(SweepDirection::Reverse),
            LabeledValues::new("cell", vec![1.0, 2.0]),
        ]);
        assert_eq!(out[0].direction, Some(SweepDirection::Reverse));
        assert_eq!(out[0].display_label(), "cell (Rev)");
        assert_eq!(out[1].display_label(), "cell");
    }
}
