use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Reason code attached to every structural parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParseErrorKind {
    MalformedHeader,
    MissingResultsBlock,
    MissingDataBlock,
    ColumnCountMismatch,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            ParseErrorKind::MalformedHeader => "MALFORMED_HEADER",
            ParseErrorKind::MissingResultsBlock => "MISSING_RESULTS_BLOCK",
            ParseErrorKind::MissingDataBlock => "MISSING_DATA_BLOCK",
            ParseErrorKind::ColumnCountMismatch => "COLUMN_COUNT_MISMATCH",
        };
        f.write_str(code)
    }
}

/// A file could not be turned into a `MeasurementFile`.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}{}: {message}", .line.map(|l| format!(" at line {l}")).unwrap_or_default())]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// 1-based source line, when the failure is tied to one.
    pub line: Option<usize>,
    pub message: String,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            line: None,
            message: message.into(),
        }
    }

    pub fn at_line(kind: ParseErrorKind, line: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            line: Some(line),
            message: message.into(),
        }
    }
}

/// Failure to load one file of a batch.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

impl LoadError {
    /// Parse reason code, if the failure was structural.
    pub fn parse_kind(&self) -> Option<ParseErrorKind> {
        match self {
            LoadError::Parse { source, .. } => Some(source.kind),
            LoadError::Io { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_line() {
        let err = ParseError::at_line(ParseErrorKind::ColumnCountMismatch, 14, "row has 3 cells");
        assert_eq!(err.to_string(), "COLUMN_COUNT_MISMATCH at line 14: row has 3 cells");

        let err = ParseError::new(ParseErrorKind::MissingDataBlock, "no Voltage marker");
        assert_eq!(err.to_string(), "MISSING_DATA_BLOCK: no Voltage marker");
    }
}
