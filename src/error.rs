//! Error types for genemap.

use thiserror::Error;

/// Result type for genemap operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for genemap operations.
///
/// Rejected mentions are ordinary output, never an `Error`; this type covers
/// configuration mistakes and collaborator failures only.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Pipeline or component configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Gate model initialization failed (missing or malformed model file).
    #[error("Model initialization failed: {0}")]
    ModelInit(String),

    /// Candidate retrieval failed in the lexical index collaborator.
    #[error("Candidate retrieval failed: {0}")]
    Retrieval(String),

    /// Background-context lookup failed in the context index collaborator.
    #[error("Context lookup failed: {0}")]
    Lookup(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a model initialization error.
    pub fn model_init(msg: impl Into<String>) -> Self {
        Error::ModelInit(msg.into())
    }

    /// Create a candidate retrieval error.
    pub fn retrieval(msg: impl Into<String>) -> Self {
        Error::Retrieval(msg.into())
    }

    /// Create a context lookup error.
    pub fn lookup(msg: impl Into<String>) -> Self {
        Error::Lookup(msg.into())
    }
}
