//! End-to-end tests: files on disk -> repository -> summary -> distributions.
//!
//! Run with: cargo test --test pipeline

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use susi_analysis::analysis::distribution::DistributionStatus;
use susi_analysis::analysis::summary;
use susi_analysis::data::error::ParseErrorKind;
use susi_analysis::data::filter::{FilterRanges, ValueRange};
use susi_analysis::data::model::{Parameter, SweepDirection};
use susi_analysis::state::AnalysisState;
use tempfile::TempDir;

/// Instrument file in the paired layout (voltage and current per column
/// pair) with the given efficiencies, forward then reverse per pixel.
fn instrument_file(efficiencies: &[(f64, f64)]) -> String {
    let mut out = String::from("SuSi\nOperator:\tlab\nActive area: 0.1 cm²\nCompliance: 10 mA\n");

    out.push_str("Parameter");
    for pixel in 1..=efficiencies.len() {
        let _ = write!(out, "\tPx{pixel} forward\tPx{pixel} reverse");
    }
    out.push('\n');
    for (label, offset) in [("Jsc", 20.0), ("Voc", 1.0), ("FF", 70.0)] {
        out.push_str(label);
        for pixel in 1..=efficiencies.len() {
            let v = offset + pixel as f64 * 0.1;
            let _ = write!(out, "\t{v:.1}\t{v:.1}");
        }
        out.push('\n');
    }
    out.push_str("PCE");
    for (fwd, rev) in efficiencies {
        let _ = write!(out, "\t{fwd}\t{rev}");
    }
    out.push_str("\n\nVoltage");
    for _ in 0..efficiencies.len() * 2 - 1 {
        out.push_str("\tJ\tV");
    }
    out.push_str("\tJ\n");
    for row in 0..5 {
        let v = row as f64 * 0.25;
        for column in 0..efficiencies.len() * 2 {
            if column > 0 {
                out.push('\t');
            }
            let _ = write!(out, "{v}\t{}", 20.0 - row as f64 * 5.0);
        }
        out.push('\n');
    }
    out
}

fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn malformed_file_is_reported_and_the_rest_compared() {
    let dir = TempDir::new().unwrap();
    let good_a = instrument_file(&[(10.0, 11.0), (12.0, 12.5), (9.0, 9.5)]);
    let mut broken = instrument_file(&[(10.0, 11.0), (12.0, 12.5)]);
    // Drop the last current column from the first data row.
    let first_row = broken.rfind("\n0\t20").unwrap() + 1;
    let row_end = first_row + broken[first_row..].find('\n').unwrap();
    let trimmed_row = broken[first_row..row_end].rsplitn(2, '\t').nth(1).unwrap().to_string();
    broken.replace_range(first_row..row_end, &trimmed_row);
    let good_c = instrument_file(&[(14.0, 13.0)]);

    let paths = vec![
        write(&dir, "a.txt", &good_a),
        write(&dir, "b.txt", &broken),
        write(&dir, "c.txt", &good_c),
    ];

    let mut state = AnalysisState {
        filters: FilterRanges::unbounded(),
        ..AnalysisState::default()
    };
    state.load_paths(&paths);

    assert_eq!(state.repository.labels(), vec!["a", "c"]);
    let failures = state.repository.failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].source.ends_with("b.txt"));
    assert_eq!(
        failures[0].error.parse_kind(),
        Some(ParseErrorKind::ColumnCountMismatch)
    );
    assert!(state
        .status_message
        .as_deref()
        .unwrap()
        .contains("COLUMN_COUNT_MISMATCH"));

    let view = state.comparison_view();
    assert_eq!(view.labels, vec!["a", "c"]);

    let eff = view.parameter(Parameter::Efficiency).unwrap();
    assert_eq!(eff.distributions.len(), 2);
    let a = &eff.distributions[0].summary;
    assert_eq!(a.count, 6);
    assert_eq!(a.status, DistributionStatus::Complete);
    // 9, 9.5, 10, 11, 12, 12.5
    assert!((a.median - 10.5).abs() < 1e-12);
    assert_eq!(a.whisker_low, 9.0);
    assert_eq!(a.whisker_high, 12.5);

    let best: Vec<(&str, u32, SweepDirection)> = view
        .best_curves
        .iter()
        .map(|b| (b.label.as_str(), b.pixel_id, b.direction))
        .collect();
    assert_eq!(
        best,
        vec![("a", 2, SweepDirection::Reverse), ("c", 1, SweepDirection::Forward)]
    );
    assert_eq!(view.best_curves[0].curve.len(), 5);
}

#[test]
fn summary_and_view_agree_for_one_file() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "cell.txt", &instrument_file(&[(10.0, 10.0), (10.0, 8.0)]));

    let mut state = AnalysisState::default();
    state.load_paths(&[path]);
    let file = state.repository.get("cell").unwrap();
    assert_eq!(file.active_area(), Some("0.1 cm²"));

    // Three-way tie at 10 % goes to pixel 1 forward.
    let set = summary::summarize(file).unwrap();
    assert_eq!((set.best_pixel.pixel_id, set.best_pixel.direction), (1, SweepDirection::Forward));

    let view = state.single_file_view("cell").unwrap();
    assert_eq!(view.best_pixel.as_ref(), Some(&set.best_pixel));
    assert_eq!(view.pixels.len(), 4);
    assert_eq!(view.pixels[3].efficiency, 8.0);
}

#[test]
fn default_filters_drop_out_of_range_fill_factors() {
    let mut state = AnalysisState::default();
    let text = instrument_file(&[(10.0, 11.0), (12.0, 13.0)]).replacen("FF\t70.1", "FF\t170.1", 1);
    state.load_sources([("x", text), ("y", instrument_file(&[(10.0, 11.0)]))]);

    let view = state.comparison_view();
    let ff = &view.parameter(Parameter::FillFactor).unwrap().distributions[0].summary;
    assert_eq!(ff.count, 3);

    state.filters.fill_factor = ValueRange::UNBOUNDED;
    let view = state.comparison_view();
    let ff = &view.parameter(Parameter::FillFactor).unwrap().distributions[0].summary;
    assert_eq!(ff.count, 4);
    assert_eq!(ff.outliers, vec![170.1]);
}
