use std::path::Path;

use log::{debug, warn};
use serde::Serialize;
use thiserror::Error;

use crate::analysis::distribution::{self, LabeledSummary, LabeledValues};
use crate::analysis::summary::{self, DirectionalLists, SummaryError};
use crate::config::AnalysisConfig;
use crate::data::filter::FilterRanges;
use crate::data::model::{IvPoint, Parameter, PixelRecord, SweepDirection};
use crate::data::repository::{GroupAssignment, MeasurementRepository, RepositoryError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("no loaded file is labelled '{0}'")]
    UnknownFile(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

// ---------------------------------------------------------------------------
// Views handed to the presentation layer
// ---------------------------------------------------------------------------

/// One pixel/direction of a single-file view. Parameters outside the
/// active filter ranges are NaN (serialised as `null`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PixelView {
    pub pixel_id: u32,
    pub direction: SweepDirection,
    pub jsc: f64,
    pub voc: f64,
    pub efficiency: f64,
    pub fill_factor: f64,
    /// Finite points inside the voltage window.
    pub curve: Vec<IvPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleFileView {
    pub label: String,
    pub header_text: String,
    pub active_area: Option<String>,
    /// Pixel-then-direction order.
    pub pixels: Vec<PixelView>,
    pub best_pixel: Option<PixelRecord>,
    /// Why `best_pixel` is missing, if it is.
    pub summary_error: Option<String>,
}

/// Distributions of one parameter, one entry per file (or per file and
/// direction), in repository order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterComparison {
    pub parameter: Parameter,
    pub distributions: Vec<LabeledSummary>,
}

/// Curve of the best pixel of one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestCurve {
    pub label: String,
    pub pixel_id: u32,
    pub direction: SweepDirection,
    pub efficiency: f64,
    pub curve: Vec<IvPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonView {
    /// Files contributing to the distributions.
    pub labels: Vec<String>,
    pub parameters: Vec<ParameterComparison>,
    pub best_curves: Vec<BestCurve>,
    /// Files without pixel records; excluded from every distribution.
    pub empty_files: Vec<String>,
}

impl ComparisonView {
    pub fn parameter(&self, parameter: Parameter) -> Option<&ParameterComparison> {
        self.parameters.iter().find(|p| p.parameter == parameter)
    }
}

// ---------------------------------------------------------------------------
// Analysis state
// ---------------------------------------------------------------------------

/// Loaded files plus the settings the views are computed with.
#[derive(Debug, Default)]
pub struct AnalysisState {
    pub repository: MeasurementRepository,
    pub filters: FilterRanges,
    /// Report forward and reverse sweeps as separate distributions.
    pub split_directions: bool,
    /// Outcome of the last load, shown to the user.
    pub status_message: Option<String>,
}

impl AnalysisState {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            filters: config.filters.clone(),
            split_directions: config.split_directions,
            ..Self::default()
        }
    }

    /// Replace the repository with the files at `paths`.
    pub fn load_paths<P: AsRef<Path>>(&mut self, paths: &[P]) {
        self.set_repository(MeasurementRepository::load_paths(paths));
    }

    /// Replace the repository with in-memory `(label, text)` pairs.
    pub fn load_sources<I, L, T>(&mut self, sources: I)
    where
        I: IntoIterator<Item = (L, T)>,
        L: Into<String>,
        T: AsRef<str>,
    {
        self.set_repository(MeasurementRepository::from_sources(sources));
    }

    fn set_repository(&mut self, repository: MeasurementRepository) {
        let loaded = repository.len();
        let mut message = format!("Loaded {loaded} file(s)");
        if !repository.failures().is_empty() {
            let failed: Vec<String> = repository
                .failures()
                .iter()
                .map(|f| match f.error.parse_kind() {
                    Some(kind) => format!("{} ({kind})", f.source),
                    None => format!("{} (IO_ERROR)", f.source),
                })
                .collect();
            message.push_str(&format!("; failed: {}", failed.join(", ")));
        }
        self.status_message = Some(message);
        self.repository = repository;
    }

    /// Positional label override; the count must match the loaded files.
    pub fn apply_labels(&mut self, labels: &[String]) -> Result<(), StateError> {
        self.repository.relabel(labels)?;
        Ok(())
    }

    pub fn apply_grouping(&mut self, assignments: &[GroupAssignment]) -> Result<(), StateError> {
        self.repository.apply_grouping(assignments)?;
        Ok(())
    }

    /// Per-pixel parameters and curves of one file.
    pub fn single_file_view(&self, label: &str) -> Result<SingleFileView, StateError> {
        let file = self
            .repository
            .get(label)
            .ok_or_else(|| StateError::UnknownFile(label.to_string()))?;

        let pixels = file
            .records_by_pixel()
            .into_iter()
            .map(|record| self.pixel_view(record))
            .collect();

        let (best_pixel, summary_error) = match summary::summarize(file) {
            Ok(set) => (Some(set.best_pixel), None),
            Err(err) => {
                debug!("No best pixel for '{label}': {err}");
                (None, Some(err.to_string()))
            }
        };

        Ok(SingleFileView {
            label: file.label.clone(),
            header_text: file.header_text(),
            active_area: file.active_area().map(str::to_string),
            pixels,
            best_pixel,
            summary_error,
        })
    }

    fn pixel_view(&self, record: &PixelRecord) -> PixelView {
        let filtered = |parameter: Parameter| {
            let value = record.value(parameter);
            if self.filters.range(parameter).contains(value) {
                value
            } else {
                f64::NAN
            }
        };
        PixelView {
            pixel_id: record.pixel_id,
            direction: record.direction,
            jsc: filtered(Parameter::Jsc),
            voc: filtered(Parameter::Voc),
            efficiency: filtered(Parameter::Efficiency),
            fill_factor: filtered(Parameter::FillFactor),
            curve: self.filters.curve_points(&record.iv_curve),
        }
    }

    /// Cross-file distributions of every parameter plus the best curve of
    /// each file.
    pub fn comparison_view(&self) -> ComparisonView {
        let mut lists: Vec<(&str, DirectionalLists)> = Vec::new();
        let mut best_curves = Vec::new();
        let mut empty_files = Vec::new();

        for file in self.repository.files() {
            match summary::summarize(file) {
                Ok(set) => {
                    best_curves.push(BestCurve {
                        label: set.label.clone(),
                        pixel_id: set.best_pixel.pixel_id,
                        direction: set.best_pixel.direction,
                        efficiency: set.best_pixel.efficiency,
                        curve: self.filters.curve_points(&set.best_pixel.iv_curve),
                    });
                    lists.push((file.label.as_str(), set.lists));
                }
                Err(SummaryError::EmptyFile(label)) => {
                    warn!("'{label}' has no pixel records; left out of the comparison");
                    empty_files.push(label);
                }
                Err(err @ SummaryError::NoFiniteEfficiency(_)) => {
                    // The other parameters still take part.
                    warn!("{err}; no best pixel");
                    lists.push((file.label.as_str(), DirectionalLists::of_file(file)));
                }
            }
        }

        let parameters = Parameter::ALL
            .iter()
            .map(|&parameter| ParameterComparison {
                parameter,
                distributions: distribution::compute(&self.inputs(&lists, parameter)),
            })
            .collect();

        ComparisonView {
            labels: lists.iter().map(|(label, _)| label.to_string()).collect(),
            parameters,
            best_curves,
            empty_files,
        }
    }

    fn inputs(&self, lists: &[(&str, DirectionalLists)], parameter: Parameter) -> Vec<LabeledValues> {
        let filtered = |file_lists: &DirectionalLists, direction: Option<SweepDirection>| {
            self.filters
                .apply(parameter, file_lists.get(direction).get(parameter))
        };

        if self.split_directions {
            lists
                .iter()
                .flat_map(|(label, file_lists)| {
                    [SweepDirection::Forward, SweepDirection::Reverse].map(|direction| {
                        LabeledValues::new(*label, filtered(file_lists, Some(direction)))
                            .with_direction(direction)
                    })
                })
                .collect()
        } else {
            lists
                .iter()
                .map(|(label, file_lists)| LabeledValues::new(*label, filtered(file_lists, None)))
                .collect()
        }
    }
}
