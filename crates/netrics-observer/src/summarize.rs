//! Per-site summarization: open a session, observe, close.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::engine::{Observer, ObserverConfig};
use crate::error::ObserveError;
use crate::session::SessionSource;
use crate::types::Website;

/// Turns a URL into a [`Website`]. The manifest store is written against
/// this trait.
#[async_trait]
pub trait Summarize: Send + Sync {
    /// Summarize one site. All-or-nothing.
    async fn summarize(&self, url: &str) -> Result<Website, ObserveError>;
}

/// [`Summarize`] backed by real browser sessions.
pub struct Summarizer<S> {
    source: S,
    observer: Observer,
    cancel: CancellationToken,
}

impl<S: SessionSource> Summarizer<S> {
    /// Create a summarizer opening sessions from `source`.
    pub fn new(source: S, config: ObserverConfig) -> Self {
        Self {
            source,
            observer: Observer::new(config),
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight and future observations when `cancel` fires.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The session source.
    pub fn source(&self) -> &S {
        &self.source
    }
}

#[async_trait]
impl<S: SessionSource> Summarize for Summarizer<S> {
    async fn summarize(&self, url: &str) -> Result<Website, ObserveError> {
        if self.cancel.is_cancelled() {
            return Err(ObserveError::Cancelled);
        }
        info!(url, "summarizing website");
        let session = self.source.open().await?;
        let result = self
            .observer
            .observe_with_cancel(session.as_ref(), url, &self.cancel)
            .await;
        if let Err(e) = session.close().await {
            warn!(url, error = %e, "failed to close browser session");
        }
        if let Ok(site) = &result {
            info!(url, resources = site.resources.len(), "website summarized");
        }
        result
    }
}
