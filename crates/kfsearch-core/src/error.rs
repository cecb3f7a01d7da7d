use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Index build failed: {0}")]
    Build(String),

    #[error("Failed to load index from {}: {reason}", path.display())]
    IndexLoad { path: PathBuf, reason: String },

    #[error("Dimension mismatch: index holds {expected}-d vectors, query has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Source '{name}' unavailable: {reason}")]
    SourceUnavailable { name: String, reason: String },

    #[error("Model '{requested}' is not available, available models are: [{}]", available.join(", "))]
    ModelUnavailable { requested: String, available: Vec<String> },

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    pub fn index_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::IndexLoad { path: path.into(), reason: reason.to_string() }
    }

    pub fn source_unavailable(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable { name: name.into(), reason: reason.to_string() }
    }

    /// Errors caused by the request itself rather than by shared state.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::DimensionMismatch { .. } | Self::InvalidArgument(_) | Self::ModelUnavailable { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
