//! Error types for composing figures, loading trials and reading styles.

use std::path::PathBuf;

/// Reasons a figure cannot be composed
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ComposeError {
    /// No trials were supplied
    #[error("no trials to plot for variable '{variable}'")]
    EmptyInput { variable: String },

    /// A trial's series is empty or its band does not line up with it
    #[error("trial '{label}' has an unusable series: {reason}")]
    InconsistentSeries { label: String, reason: String },
}

/// Errors raised while reading a trial file
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("unsupported file type: {0} (expected .csv, .sto or .txt)")]
    UnsupportedExtension(PathBuf),

    #[error("header row {row} not found in {path}")]
    MissingHeader { path: PathBuf, row: usize },

    #[error("no numeric data in {0}")]
    NoNumericData(PathBuf),
}

/// Errors raised while reading a style file
#[derive(Debug, thiserror::Error)]
pub enum StyleError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid style JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid style: {0}")]
    Invalid(String),
}
