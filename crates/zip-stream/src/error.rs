//! Archive error types.

use thiserror::Error;

/// Errors raised while building an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Writing to or reading back from the spool failed.
    #[error("Archive I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A data source failed while producing entry content.
    #[error("Data source failed: {0}")]
    Source(String),

    /// An entry's producer returned an error; the archive is truncated.
    #[error("Failed to produce archive entry '{name}': {message}")]
    Producer { name: String, message: String },

    /// A blocking compression task panicked or was cancelled.
    #[error("Archive task failed: {0}")]
    Task(String),

    /// The archive was already finished.
    #[error("Archive already finished")]
    Finished,
}

impl ArchiveError {
    /// Convenience constructor for producer-side failures.
    pub fn source(err: impl std::fmt::Display) -> Self {
        ArchiveError::Source(err.to_string())
    }
}
