use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, warn};

use super::error::{ParseError, ParseErrorKind};
use super::model::{HeaderEntry, IvPoint, MeasurementFile, Parameter, PixelRecord, SweepDirection};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Read a file as text. The instrument writes Latin-1, so bytes that are
/// not valid UTF-8 are decoded one byte per character.
pub fn read_text(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => err.into_bytes().into_iter().map(char::from).collect(),
    })
}

/// File stem used as the default display label.
pub fn default_label(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Parse the full text of one instrument file.
///
/// Expected layout (tab-separated, blank lines ignored):
///
/// ```text
/// Sample: A1                      ┐
/// Active Area: 0.105 cm²          │ header, ended by a "Compliance" line
/// Compliance: 20 mA               ┘
/// Parameter  Pixel 1 Fwd  Pixel 1 Rev  ...   ┐
/// Jsc [mA/cm²]  21.5  21.7  ...              │ results
/// Voc [V]  FF [%]  Eff [%] rows ...          ┘
/// Voltage [V]  J P1 Fwd  J P1 Rev  ...       ┐
/// -0.10  21.6  21.8  ...                     │ data: shared voltage column
/// ...                                        ┘ or (V, J) pairs per column
/// ```
///
/// The scalar results are taken verbatim; they already carry the
/// instrument's corrections. Non-numeric cells become NaN.
pub fn parse(raw_text: &str, label: impl Into<String>) -> Result<MeasurementFile, ParseError> {
    let rows = split_rows(raw_text)?;
    if rows.is_empty() {
        return Err(ParseError::new(
            ParseErrorKind::MalformedHeader,
            "input contains no lines",
        ));
    }

    let scan = Scanner::default().run(rows);
    let table = scan.results_table()?;
    let curves = scan.curves(table.columns.len())?;

    let pixel_records = table
        .columns
        .iter()
        .zip(curves)
        .enumerate()
        .map(|(col, (&(pixel_id, direction), iv_curve))| PixelRecord {
            pixel_id,
            direction,
            jsc: table.jsc[col],
            voc: table.voc[col],
            efficiency: table.efficiency[col],
            fill_factor: table.fill_factor[col],
            iv_curve,
        })
        .collect();

    Ok(MeasurementFile {
        label: label.into(),
        header: scan.header,
        pixel_records,
    })
}

// ---------------------------------------------------------------------------
// Line splitting
// ---------------------------------------------------------------------------

/// One non-blank source line split into trimmed cells.
#[derive(Debug, Clone)]
struct Row {
    line: usize,
    cells: Vec<String>,
}

impl Row {
    fn first(&self) -> &str {
        self.cells.first().map(String::as_str).unwrap_or("")
    }

    /// Cells after the row label, trailing empty cells removed.
    fn trimmed_values(&self) -> &[String] {
        let values = self.cells.get(1..).unwrap_or(&[]);
        let end = values
            .iter()
            .rposition(|cell| !cell.is_empty())
            .map_or(0, |last| last + 1);
        &values[..end]
    }

    fn value_count(&self) -> usize {
        self.cells.len().saturating_sub(1)
    }
}

fn split_rows(text: &str) -> Result<Vec<Row>, ParseError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    let mut record = StringRecord::new();
    loop {
        match reader.read_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => {
                let message = format!("unreadable line: {err}");
                return Err(match err.position() {
                    Some(pos) => ParseError::at_line(
                        ParseErrorKind::MalformedHeader,
                        pos.line() as usize,
                        message,
                    ),
                    None => ParseError::new(ParseErrorKind::MalformedHeader, message),
                });
            }
        }
        if record.iter().all(str::is_empty) {
            continue;
        }
        let line = record.position().map_or(0, |pos| pos.line() as usize);
        rows.push(Row {
            line,
            cells: record.iter().map(str::to_string).collect(),
        });
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Section scanner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Results,
    Data,
}

/// Forward-only state machine over the rows of one file.
#[derive(Debug, Default)]
struct Scanner {
    header: Vec<HeaderEntry>,
    column_labels: Option<Row>,
    results: Vec<(Parameter, Row)>,
    data_marker: Option<usize>,
    data_rows: Vec<Row>,
}

impl Scanner {
    fn run(mut self, rows: Vec<Row>) -> Self {
        let mut section = Section::Header;
        // Last header row; it becomes the column label row if the results
        // block starts without a compliance marker.
        let mut previous: Option<Row> = None;

        for row in rows {
            match section {
                // A "Voltage ..." line here is metadata; the data marker only
                // counts once the results block has begun.
                Section::Header => {
                    if let Some(parameter) = header_parameter_row(&row) {
                        debug!("results block starts at line {}", row.line);
                        if let Some(prev) = previous.take() {
                            if prev.cells.len() == row.cells.len() && !prev.first().contains(':') {
                                self.header.pop();
                                self.column_labels = Some(prev);
                            }
                        }
                        self.push_result(parameter, row);
                        section = Section::Results;
                    } else {
                        let ends_header = row
                            .cells
                            .iter()
                            .any(|cell| cell.to_lowercase().contains("compliance"));
                        self.header.push(header_entry(&row.cells));
                        if ends_header {
                            debug!("header ends at line {}", row.line);
                            section = Section::Results;
                        } else {
                            previous = Some(row);
                        }
                    }
                }
                Section::Results => {
                    if is_data_marker(row.first()) {
                        debug!("data block starts at line {}", row.line);
                        self.data_marker = Some(row.line);
                        section = Section::Data;
                    } else if let Some(parameter) = Parameter::from_label(row.first()) {
                        self.push_result(parameter, row);
                    } else if self.results.is_empty() && self.column_labels.is_none() && row.cells.len() > 1 {
                        self.column_labels = Some(row);
                    } else if self.results.is_empty() && row.cells.len() == 1 {
                        self.header.push(header_entry(&row.cells));
                    } else {
                        debug!("ignoring results row '{}' at line {}", row.first(), row.line);
                    }
                }
                Section::Data => self.data_rows.push(row),
            }
        }
        self
    }

    fn push_result(&mut self, parameter: Parameter, row: Row) {
        if self.results.iter().any(|(p, _)| *p == parameter) {
            warn!(
                "duplicate {} row at line {} ignored",
                parameter.name(),
                row.line
            );
            return;
        }
        self.results.push((parameter, row));
    }

    fn result_row(&self, parameter: Parameter) -> Option<&Row> {
        self.results
            .iter()
            .find(|(p, _)| *p == parameter)
            .map(|(_, row)| row)
    }

    fn results_table(&self) -> Result<ResultsTable, ParseError> {
        let Some((_, first)) = self.results.first() else {
            return Err(ParseError::new(
                ParseErrorKind::MissingResultsBlock,
                "no Jsc/Voc/FF/Efficiency rows found",
            ));
        };

        let missing: Vec<&str> = Parameter::ALL
            .iter()
            .filter(|p| self.result_row(**p).is_none())
            .map(|p| p.name())
            .collect();
        if !missing.is_empty() {
            return Err(ParseError::at_line(
                ParseErrorKind::MissingResultsBlock,
                first.line,
                format!("results block lacks rows for {}", missing.join(", ")),
            ));
        }

        let width = self
            .results
            .iter()
            .map(|(_, row)| row)
            .chain(self.column_labels.as_ref())
            .map(|row| row.trimmed_values().len())
            .max()
            .unwrap_or(0);

        for row in self.results.iter().map(|(_, row)| row).chain(self.column_labels.as_ref()) {
            if row.value_count() < width {
                return Err(ParseError::at_line(
                    ParseErrorKind::ColumnCountMismatch,
                    row.line,
                    format!(
                        "row '{}' has {} result columns, expected {width}",
                        row.first(),
                        row.value_count()
                    ),
                ));
            }
        }

        let columns = column_identities(self.column_labels.as_ref(), width)?;
        let values = |parameter: Parameter| -> Vec<f64> {
            self.result_row(parameter)
                .map(|row| row.cells[1..=width].iter().map(|c| parse_cell(c)).collect())
                .unwrap_or_default()
        };

        Ok(ResultsTable {
            jsc: values(Parameter::Jsc),
            voc: values(Parameter::Voc),
            efficiency: values(Parameter::Efficiency),
            fill_factor: values(Parameter::FillFactor),
            columns,
        })
    }

    fn curves(&self, columns: usize) -> Result<Vec<Vec<IvPoint>>, ParseError> {
        let Some(marker) = self.data_marker else {
            return Err(ParseError::new(
                ParseErrorKind::MissingDataBlock,
                "no line starting with 'Voltage' found",
            ));
        };

        // Column names and unit rows sit between the marker and the samples.
        let rows: Vec<&Row> = self
            .data_rows
            .iter()
            .skip_while(|row| !is_number(row.first()))
            .collect();

        if rows.is_empty() || (columns > 0 && rows.len() < 2) {
            return Err(ParseError::at_line(
                ParseErrorKind::MissingDataBlock,
                marker,
                format!("{} numeric data rows after the Voltage marker", rows.len()),
            ));
        }

        let layout = DataLayout::detect(&rows, columns)?;
        debug!("data block uses {layout:?} layout with {} rows", rows.len());

        let mut curves = vec![Vec::with_capacity(rows.len()); columns];
        for row in &rows {
            for (col, curve) in curves.iter_mut().enumerate() {
                curve.push(layout.point(&row.cells, col));
            }
        }
        Ok(curves)
    }
}

/// Scalar results per column, one field per parameter.
#[derive(Debug)]
struct ResultsTable {
    columns: Vec<(u32, SweepDirection)>,
    jsc: Vec<f64>,
    voc: Vec<f64>,
    efficiency: Vec<f64>,
    fill_factor: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Data block layouts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataLayout {
    /// `V, I1, I2, ...`: one voltage column shared by all sweeps.
    SharedVoltage,
    /// `V1, I1, V2, I2, ...`: a voltage column per sweep.
    Paired,
}

impl DataLayout {
    fn width(self, columns: usize) -> usize {
        match self {
            DataLayout::SharedVoltage => columns + 1,
            DataLayout::Paired => columns * 2,
        }
    }

    fn fits(self, row: &Row, columns: usize) -> bool {
        let width = self.width(columns);
        row.cells.len() >= width && row.cells[width..].iter().all(String::is_empty)
    }

    fn detect(rows: &[&Row], columns: usize) -> Result<Self, ParseError> {
        let candidates: &[DataLayout] = if columns == 0 {
            &[DataLayout::SharedVoltage]
        } else {
            &[DataLayout::SharedVoltage, DataLayout::Paired]
        };

        if let Some(layout) = candidates
            .iter()
            .copied()
            .find(|layout| rows.iter().all(|row| layout.fits(row, columns)))
        {
            return Ok(layout);
        }

        let message = format!(
            "data rows fit neither {} cells (shared voltage) nor {} cells (paired) for {columns} result columns",
            DataLayout::SharedVoltage.width(columns),
            DataLayout::Paired.width(columns),
        );
        Err(
            match rows
                .iter()
                .find(|row| !DataLayout::SharedVoltage.fits(row, columns))
            {
                Some(row) => ParseError::at_line(ParseErrorKind::ColumnCountMismatch, row.line, message),
                None => ParseError::new(ParseErrorKind::ColumnCountMismatch, message),
            },
        )
    }

    fn point(self, cells: &[String], col: usize) -> IvPoint {
        let (v, i) = match self {
            DataLayout::SharedVoltage => (0, col + 1),
            DataLayout::Paired => (2 * col, 2 * col + 1),
        };
        IvPoint {
            voltage: parse_cell(&cells[v]),
            current: parse_cell(&cells[i]),
        }
    }
}

// ---------------------------------------------------------------------------
// Cell helpers
// ---------------------------------------------------------------------------

fn parse_cell(cell: &str) -> f64 {
    cell.parse::<f64>().unwrap_or(f64::NAN)
}

fn is_number(cell: &str) -> bool {
    cell.parse::<f64>().is_ok()
}

fn is_data_marker(cell: &str) -> bool {
    cell.to_lowercase().starts_with("voltage")
}

/// A parameter row seen while still in the header. Without a compliance
/// marker it must carry at least one value and must not look like a
/// `Key: value` line.
fn header_parameter_row(row: &Row) -> Option<Parameter> {
    if row.cells.len() < 2 || row.first().contains(':') {
        return None;
    }
    Parameter::from_label(row.first())
}

fn header_entry(cells: &[String]) -> HeaderEntry {
    if cells.len() > 1 {
        let value: Vec<&str> = cells[1..]
            .iter()
            .map(String::as_str)
            .filter(|c| !c.is_empty())
            .collect();
        return HeaderEntry {
            key: cells[0].trim_end_matches(':').trim().to_string(),
            value: value.join("\t"),
        };
    }
    match cells[0].split_once(':') {
        Some((key, value)) => HeaderEntry {
            key: key.trim().to_string(),
            value: value.trim().to_string(),
        },
        None => HeaderEntry {
            key: cells[0].clone(),
            value: String::new(),
        },
    }
}

/// Decode a results column label such as `Pixel 3 Rev` or `P1_forward`.
fn decode_column_label(label: &str) -> Option<(u32, SweepDirection)> {
    let lower = label.to_lowercase();
    let direction = if lower.contains("rev") {
        SweepDirection::Reverse
    } else if lower.contains("fwd") || lower.contains("forw") {
        SweepDirection::Forward
    } else {
        return None;
    };
    let digits: String = lower
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    Some((digits.parse().ok()?, direction))
}

/// Pixel id and direction per results column. Falls back to the
/// instrument's alternating order (pixel 1 fwd, pixel 1 rev, ...) when no
/// label can be decoded.
fn column_identities(
    labels: Option<&Row>,
    width: usize,
) -> Result<Vec<(u32, SweepDirection)>, ParseError> {
    let decoded: Vec<Option<(u32, SweepDirection)>> = labels
        .map(|row| row.cells[1..=width].iter().map(|l| decode_column_label(l)).collect())
        .unwrap_or_default();
    let line = labels.map_or(0, |row| row.line);

    let columns: Vec<(u32, SweepDirection)> = if !decoded.is_empty() && decoded.iter().all(Option::is_some) {
        decoded.into_iter().flatten().collect()
    } else if decoded.iter().any(Option::is_some) {
        return Err(ParseError::at_line(
            ParseErrorKind::MalformedHeader,
            line,
            "only some result column labels name a pixel and sweep direction",
        ));
    } else {
        (0..width)
            .map(|col| {
                let direction = if col % 2 == 0 {
                    SweepDirection::Forward
                } else {
                    SweepDirection::Reverse
                };
                (col as u32 / 2 + 1, direction)
            })
            .collect()
    };

    let mut seen = BTreeSet::new();
    for column in &columns {
        if !seen.insert(*column) {
            return Err(ParseError::at_line(
                ParseErrorKind::MalformedHeader,
                line,
                format!("pixel {} ({}) appears in two columns", column.0, column.1),
            ));
        }
    }
    Ok(columns)
}
