//! Browser-specific error types.

use netrics_observer::ObserveError;
use thiserror::Error;

/// Errors from the CDP transport.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Failed to launch the Chrome browser process.
    #[error("failed to launch browser: {context}")]
    LaunchFailed {
        /// What went wrong during launch.
        context: String,
    },

    /// Navigation to a URL failed.
    #[error("navigation failed for {url}: {reason}")]
    NavigationFailed {
        /// The URL that failed to load.
        url: String,
        /// Why it failed.
        reason: String,
    },

    /// An in-page script threw or returned nothing usable.
    #[error("evaluation failed: {reason}")]
    EvaluationFailed {
        /// Exception description from the page.
        reason: String,
    },

    /// Chrome executable not found on the system.
    #[error("Chrome not found: install Google Chrome or Chromium, or set CHROME_PATH")]
    ChromeNotFound,

    /// Operation timed out.
    #[error("timed out after {timeout_ms}ms: {context}")]
    Timeout {
        /// How long we waited.
        timeout_ms: u64,
        /// What we were waiting for.
        context: String,
    },

    /// CDP protocol error.
    #[error("CDP error: {0}")]
    Cdp(String),

    /// The DevTools connection went away mid-command.
    #[error("CDP connection closed")]
    ConnectionClosed,
}

impl From<BrowserError> for ObserveError {
    fn from(err: BrowserError) -> Self {
        match err {
            BrowserError::NavigationFailed { url, reason } => ObserveError::Navigation { url, reason },
            other => ObserveError::Session(other.to_string()),
        }
    }
}
