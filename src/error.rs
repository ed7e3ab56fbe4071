//! Error types for gravsim.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown integration method index {0} (supported: 0..=5)")]
    UnknownMethod(i64),

    #[error("invalid value for {name}: {value}")]
    InvalidOption { name: &'static str, value: String },

    #[error("CSV header mismatch, got: {0}")]
    CsvHeader(String),

    #[error("malformed CSV row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, SimulationError>;
