/// Data layer: core types, parsing, storage and filtering.
///
/// Architecture:
/// ```text
///  SuSi .txt files
///        │
///        ▼
///   ┌──────────┐
///   │  parser   │  header / results / data blocks → MeasurementFile
///   └──────────┘
///        │
///        ▼
///   ┌────────────┐
///   │ repository  │  labelled files + per-file load failures
///   └────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  parameter ranges, voltage window → NaN / dropped points
///   └──────────┘
/// ```

pub mod error;
pub mod filter;
pub mod model;
pub mod parser;
pub mod repository;

#[cfg(test)]
pub(crate) mod fixtures;
