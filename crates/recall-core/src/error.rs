//! Error taxonomy shared by every port and adapter.
//!
//! Adapters convert their backend errors into one of these variants at the
//! port boundary; the pipeline only ever looks at [`Error::is_retryable`].

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A store call (object, vector or record store) failed.
    #[error("Store operation failed: {0}")]
    Store(String),

    /// Input data is inconsistent; fatal for the run that produced it.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to decode image {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Labeler '{labeler}' failed: {reason}")]
    Labeler { labeler: String, reason: String },

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn store(err: impl std::fmt::Display) -> Self { Self::Store(err.to_string()) }

    /// Wraps an adapter's `anyhow` chain, keeping every cause in the message.
    pub fn store_chain(err: &anyhow::Error) -> Self { Self::Store(format!("{err:#}")) }

    pub fn labeler(labeler: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Labeler { labeler: labeler.into(), reason: reason.to_string() }
    }

    /// Transient failures are retried by the pipeline; everything else is
    /// either fatal for the run or skips the current image.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Labeler { .. } | Self::Embedding(_) | Self::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
