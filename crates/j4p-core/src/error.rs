//! Error types for the J4P skim

use thiserror::Error;

/// J4P error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid or contradictory configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed golden lumi-validity file
    #[error("Malformed lumi-validity file: {0}")]
    LumiMask(String),

    /// Input could not be opened or decoded
    #[error("Input error: {0}")]
    Input(String),

    /// A column the pipeline needs is absent from an input table
    #[error("Missing required column '{column}' in table '{table}' of {partition}")]
    MissingColumn {
        /// Table name (`Events` or `Runs`).
        table: String,
        /// Column name.
        column: String,
        /// Partition locator.
        partition: String,
    },

    /// A column exists but has an unsupported type
    #[error("Column '{column}' has unsupported type {actual}")]
    ColumnType {
        /// Column name.
        column: String,
        /// Arrow data type as text.
        actual: String,
    },

    /// Writing output failed
    #[error("Output error: {0}")]
    Output(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
