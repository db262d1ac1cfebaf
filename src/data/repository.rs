use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::error::LoadError;
use super::model::MeasurementFile;
use super::parser;

/// A file of a batch that could not be loaded.
#[derive(Debug)]
pub struct LoadFailure {
    /// Path or caller-supplied name of the input.
    pub source: String,
    pub error: LoadError,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("no loaded file is labelled '{0}'")]
    UnknownLabel(String),
    #[error("label '{0}' is already in use")]
    DuplicateLabel(String),
    #[error("expected {expected} labels, got {actual}")]
    LabelCountMismatch { expected: usize, actual: usize },
    #[error("'{0}' is assigned to more than one group")]
    DuplicateAssignment(String),
    #[error("pixel ids in group '{0}' exceed the supported range")]
    PixelIdOverflow(String),
}

/// Places one loaded file into a named group at a given position.
/// Files sharing a group name are combined into one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAssignment {
    pub label: String,
    pub group: String,
    pub order: usize,
}

/// All files of the current load, keyed by unique label, plus the
/// failures of that load. Rebuilt wholesale on every load.
#[derive(Debug, Default)]
pub struct MeasurementRepository {
    files: Vec<MeasurementFile>,
    failures: Vec<LoadFailure>,
}

impl MeasurementRepository {
    /// Load every path; failures are collected, never propagated.
    pub fn load_paths<P: AsRef<Path>>(paths: &[P]) -> Self {
        let mut repo = Self::default();
        for path in paths {
            let path = path.as_ref();
            let outcome = parser::read_text(path)
                .map_err(|source| LoadError::Io {
                    path: path.to_path_buf(),
                    source,
                })
                .and_then(|text| {
                    parser::parse(&text, parser::default_label(path)).map_err(|source| {
                        LoadError::Parse {
                            path: path.to_path_buf(),
                            source,
                        }
                    })
                });
            repo.record(path.display().to_string(), outcome);
        }
        repo
    }

    /// Parse in-memory `(label, text)` pairs.
    pub fn from_sources<I, L, T>(sources: I) -> Self
    where
        I: IntoIterator<Item = (L, T)>,
        L: Into<String>,
        T: AsRef<str>,
    {
        let mut repo = Self::default();
        for (label, text) in sources {
            let label = label.into();
            let outcome = parser::parse(text.as_ref(), label.clone()).map_err(|source| {
                LoadError::Parse {
                    path: PathBuf::from(&label),
                    source,
                }
            });
            repo.record(label, outcome);
        }
        repo
    }

    fn record(&mut self, source: String, outcome: Result<MeasurementFile, LoadError>) {
        match outcome {
            Ok(mut file) => {
                file.label = self.unique_label(&file.label);
                info!(
                    "Loaded '{}' from {source} ({} pixel records)",
                    file.label,
                    file.pixel_records.len()
                );
                self.files.push(file);
            }
            Err(error) => {
                warn!("Failed to load {source}: {error}");
                self.failures.push(LoadFailure { source, error });
            }
        }
    }

    fn unique_label(&self, wanted: &str) -> String {
        if self.get(wanted).is_none() {
            return wanted.to_string();
        }
        (2..)
            .map(|n| format!("{wanted} ({n})"))
            .find(|candidate| self.get(candidate).is_none())
            .unwrap_or_else(|| wanted.to_string())
    }

    /// Successfully parsed files in load order.
    pub fn files(&self) -> &[MeasurementFile] {
        &self.files
    }

    pub fn failures(&self) -> &[LoadFailure] {
        &self.failures
    }

    pub fn get(&self, label: &str) -> Option<&MeasurementFile> {
        self.files.iter().find(|f| f.label == label)
    }

    pub fn labels(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.label.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Rename one file. Pixel data is untouched.
    pub fn set_label(&mut self, old: &str, new: &str) -> Result<(), RepositoryError> {
        if old != new && self.get(new).is_some() {
            return Err(RepositoryError::DuplicateLabel(new.to_string()));
        }
        let file = self
            .files
            .iter_mut()
            .find(|f| f.label == old)
            .ok_or_else(|| RepositoryError::UnknownLabel(old.to_string()))?;
        file.label = new.to_string();
        Ok(())
    }

    /// Replace all labels positionally; the count must match.
    pub fn relabel(&mut self, labels: &[String]) -> Result<(), RepositoryError> {
        if labels.len() != self.files.len() {
            return Err(RepositoryError::LabelCountMismatch {
                expected: self.files.len(),
                actual: labels.len(),
            });
        }
        for (i, label) in labels.iter().enumerate() {
            if labels[..i].contains(label) {
                return Err(RepositoryError::DuplicateLabel(label.clone()));
            }
        }
        for (file, label) in self.files.iter_mut().zip(labels) {
            file.label = label.clone();
        }
        Ok(())
    }

    /// Reorder files and merge those assigned to the same group.
    ///
    /// Groups appear in order of their first member after sorting by
    /// `order`; files without an assignment keep their label and follow.
    /// Pixel ids of later members are shifted past the ids already in the
    /// group so they stay unique.
    pub fn apply_grouping(&mut self, assignments: &[GroupAssignment]) -> Result<(), RepositoryError> {
        for (i, assignment) in assignments.iter().enumerate() {
            if self.get(&assignment.label).is_none() {
                return Err(RepositoryError::UnknownLabel(assignment.label.clone()));
            }
            if assignments[..i].iter().any(|a| a.label == assignment.label) {
                return Err(RepositoryError::DuplicateAssignment(assignment.label.clone()));
            }
        }
        let is_assigned = |label: &str| assignments.iter().any(|a| a.label == label);
        // A group may not take the name of a file that stays on its own.
        if let Some(clash) = assignments.iter().find(|a| {
            let group = a.group.trim();
            self.get(group).is_some() && !is_assigned(group)
        }) {
            return Err(RepositoryError::DuplicateLabel(clash.group.trim().to_string()));
        }

        let mut sorted: Vec<&GroupAssignment> = assignments.iter().collect();
        sorted.sort_by_key(|a| a.order);

        let mut members: Vec<(String, Vec<&MeasurementFile>)> = Vec::new();
        let assigned = sorted.iter().filter_map(|a| {
            self.get(&a.label).map(|file| (a.group.trim().to_string(), file))
        });
        let unassigned = self
            .files
            .iter()
            .filter(|f| !is_assigned(&f.label))
            .map(|file| (file.label.clone(), file));

        for (group, file) in assigned.chain(unassigned) {
            match members.iter_mut().find(|(name, _)| *name == group) {
                Some((_, files)) => files.push(file),
                None => members.push((group, vec![file])),
            }
        }

        let combined = members
            .into_iter()
            .map(|(group, files)| combine(group, &files))
            .collect::<Result<Vec<_>, _>>()?;
        info!("Grouped {} files into {} entries", self.files.len(), combined.len());
        self.files = combined;
        Ok(())
    }
}

fn combine(label: String, files: &[&MeasurementFile]) -> Result<MeasurementFile, RepositoryError> {
    let mut combined = MeasurementFile {
        label,
        header: files.first().map(|f| f.header.clone()).unwrap_or_default(),
        pixel_records: Vec::new(),
    };
    for file in files {
        let offset = combined.max_pixel_id();
        for record in &file.pixel_records {
            let mut record = record.clone();
            record.pixel_id = record
                .pixel_id
                .checked_add(offset)
                .ok_or_else(|| RepositoryError::PixelIdOverflow(combined.label.clone()))?;
            combined.pixel_records.push(record);
        }
    }
    Ok(combined)
}
