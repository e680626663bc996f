//! Observation error types.

use thiserror::Error;

/// Errors from a single page-load observation.
///
/// Summarization is all-or-nothing: any of these means no `Website` was
/// produced for the URL.
#[derive(Debug, Error)]
pub enum ObserveError {
    /// The browser could not load the URL.
    #[error("navigation failed for {url}: {reason}")]
    Navigation {
        /// The URL that failed to load.
        url: String,
        /// Why it failed.
        reason: String,
    },

    /// The page did not settle before the hard session deadline.
    #[error("page {url} did not settle within {timeout_ms}ms")]
    Deadline {
        /// The URL being observed.
        url: String,
        /// The deadline that elapsed.
        timeout_ms: u64,
    },

    /// The caller cancelled the observation.
    #[error("observation cancelled")]
    Cancelled,

    /// The browser session itself failed (launch, transport, evaluation).
    #[error("browser session error: {0}")]
    Session(String),
}

impl ObserveError {
    /// Whether this failure came from the session deadline rather than
    /// the page or the transport.
    pub fn is_deadline(&self) -> bool {
        matches!(self, Self::Deadline { .. })
    }
}
