//! Error types for astroprof

use thiserror::Error;

/// astroprof error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed request (mismatched lengths, zero bins, empty field list, bad range).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unsupported number of binning fields.
    #[error("unsupported profile dimensionality: {0} bin fields (expected 1 or 2)")]
    Dimensionality(usize),

    /// Requested mesh resolution is incompatible with the data domain.
    #[error("bounds definition error: {0}")]
    BoundsDefinition(String),

    /// Field name is neither a raw nor a derived field of the data source.
    #[error("field not found: {0}")]
    FieldNotFound(String),

    /// Derived-field expression parse or resolution error.
    #[error("expression error: {0}")]
    Expression(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
