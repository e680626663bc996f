//! Manifest error types.

use netrics_observer::ObserveError;

/// Errors from loading, saving or refreshing a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// File I/O error.
    #[error("manifest I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parse or serialization error.
    #[error("manifest JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Summarizing one entry failed during a refresh.
    #[error("failed to summarize {title}: {source}")]
    Summarize {
        /// Manifest key of the entry.
        title: String,
        /// Underlying observation failure.
        source: ObserveError,
    },
}

/// Convenience alias for manifest results.
pub type Result<T> = std::result::Result<T, ManifestError>;
