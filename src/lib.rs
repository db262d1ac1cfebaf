//! Parsing and statistics for SuSi sun-simulator I-V measurement files.
//!
//! Files are parsed into [`data::model::MeasurementFile`]s and collected in a
//! [`data::repository::MeasurementRepository`]. [`analysis`] summarises each
//! file and compares parameter distributions across files; [`state`] ties
//! both together into the views a front end renders.

pub mod analysis;
pub mod config;
pub mod data;
pub mod state;
