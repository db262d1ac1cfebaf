//! Deterministic synthetic instrument files for unit tests.

use std::fmt::Write;

use super::model::{Parameter, SweepDirection};

fn direction_offset(direction: SweepDirection) -> f64 {
    match direction {
        SweepDirection::Forward => 0.0,
        SweepDirection::Reverse => 0.25,
    }
}

/// Value written into the results block for one pixel/direction.
pub fn scalar(parameter: Parameter, pixel: u32, direction: SweepDirection) -> f64 {
    let base = match parameter {
        Parameter::Jsc => 20.0,
        Parameter::Voc => 1.0,
        Parameter::Efficiency => 15.0,
        Parameter::FillFactor => 70.0,
    };
    base + pixel as f64 * 0.5 + direction_offset(direction)
}

pub fn voltage(row: usize) -> f64 {
    -0.1 + row as f64 * 0.25
}

pub fn current(pixel: u32, direction: SweepDirection, row: usize) -> f64 {
    20.0 + pixel as f64 - row as f64 * 3.5 + direction_offset(direction)
}

/// Render a file with `pixels` pixels (forward and reverse each) and
/// `rows` voltage steps in the shared-voltage layout.
pub fn render(pixels: u32, rows: usize) -> String {
    let columns: Vec<(u32, SweepDirection)> = (1..=pixels)
        .flat_map(|p| [(p, SweepDirection::Forward), (p, SweepDirection::Reverse)])
        .collect();

    let mut out = String::new();
    out.push_str("SuSi measurement\n");
    out.push_str("Sample ID:\tA1\n");
    out.push_str("Date: 2025-04-15 10:31\n");
    out.push_str("Active Area: 0.105 cm²\n");
    out.push_str("Irradiance: 100 mW/cm²\n");
    out.push_str("Compliance: 20 mA\n\n");

    out.push_str("Parameter");
    for (pixel, direction) in &columns {
        let _ = write!(out, "\tPixel {pixel} {direction}");
    }
    out.push('\n');

    let rows_in_file = [
        ("Jsc [mA/cm²]", Parameter::Jsc),
        ("Voc [V]", Parameter::Voc),
        ("FF [%]", Parameter::FillFactor),
        ("Eff [%]", Parameter::Efficiency),
    ];
    for (label, parameter) in rows_in_file {
        out.push_str(label);
        for (pixel, direction) in &columns {
            let _ = write!(out, "\t{}", scalar(parameter, *pixel, *direction));
        }
        out.push('\n');
    }
    out.push('\n');

    out.push_str("Voltage [V]");
    for (pixel, direction) in &columns {
        let _ = write!(out, "\tJ P{pixel} {direction}");
    }
    out.push('\n');
    out.push_str("[V]");
    for _ in &columns {
        out.push_str("\t[mA/cm²]");
    }
    out.push('\n');

    for row in 0..rows {
        let _ = write!(out, "{}", voltage(row));
        for (pixel, direction) in &columns {
            let _ = write!(out, "\t{}", current(*pixel, *direction, row));
        }
        out.push('\n');
    }
    out
}
