//! Scripted in-memory session for engine tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;

use crate::error::ObserveError;
use crate::session::{EventStream, PageSession, SessionSource};
use crate::types::NetworkEvent;

/// Build a GET start event.
pub fn started(id: &str, url: &str, resource_type: &str) -> NetworkEvent {
    NetworkEvent::RequestStarted {
        id: id.into(),
        url: url.into(),
        method: "GET".into(),
        headers: std::collections::BTreeMap::new(),
        post_data: None,
        resource_type: resource_type.into(),
    }
}

/// Build a finish event.
pub fn finished(id: &str) -> NetworkEvent {
    NetworkEvent::RequestFinished {
        id: id.into(),
        encoded_size: 512,
    }
}

/// Build a failure event.
pub fn failed(id: &str) -> NetworkEvent {
    NetworkEvent::RequestFailed { id: id.into() }
}

/// Build the network-idle lifecycle event.
pub fn network_idle() -> NetworkEvent {
    NetworkEvent::Lifecycle {
        name: crate::types::NETWORK_IDLE.into(),
    }
}

/// A session replaying events, each after a delay relative to the previous.
pub struct ScriptedSession {
    events: Mutex<Option<Vec<(Duration, NetworkEvent)>>>,
    navigation_error: Option<String>,
    favicon: Option<Result<String, String>>,
    closed: Arc<AtomicBool>,
}

impl ScriptedSession {
    /// Replay `events` with no delay between them.
    pub fn new(events: Vec<NetworkEvent>) -> Self {
        Self::timed(events.into_iter().map(|e| (Duration::ZERO, e)).collect())
    }

    /// Replay `(delay, event)` pairs.
    pub fn timed(events: Vec<(Duration, NetworkEvent)>) -> Self {
        Self {
            events: Mutex::new(Some(events)),
            navigation_error: None,
            favicon: Some(Ok("https://example.com/favicon.ico".into())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make navigation fail with `reason`.
    pub fn failing_navigation(mut self, reason: &str) -> Self {
        self.navigation_error = Some(reason.into());
        self
    }

    /// Result of the favicon script.
    pub fn with_favicon(mut self, favicon: Result<String, String>) -> Self {
        self.favicon = Some(favicon);
        self
    }

    /// Make the favicon script never return.
    pub fn hanging_favicon(mut self) -> Self {
        self.favicon = None;
        self
    }

    /// Flag set once `close` runs.
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

#[async_trait]
impl PageSession for ScriptedSession {
    async fn subscribe(&self) -> Result<EventStream, ObserveError> {
        let events = self.events.lock().take().unwrap_or_default();
        Ok(futures::stream::iter(events)
            .then(|(delay, event)| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                event
            })
            .boxed())
    }

    async fn navigate(&self, url: &str) -> Result<(), ObserveError> {
        match &self.navigation_error {
            Some(reason) => Err(ObserveError::Navigation {
                url: url.into(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn evaluate(&self, _expression: &str) -> Result<String, ObserveError> {
        match &self.favicon {
            Some(favicon) => favicon.clone().map_err(ObserveError::Session),
            None => std::future::pending().await,
        }
    }

    async fn close(&self) -> Result<(), ObserveError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out scripted sessions built by a closure, counting opens.
pub struct ScriptedSource<F> {
    build: F,
    /// Number of sessions opened so far.
    pub opened: AtomicUsize,
}

impl<F> ScriptedSource<F>
where
    F: Fn(usize) -> ScriptedSession + Send + Sync,
{
    /// Create a source; `build` receives the open count.
    pub fn new(build: F) -> Self {
        Self {
            build,
            opened: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl<F> SessionSource for ScriptedSource<F>
where
    F: Fn(usize) -> ScriptedSession + Send + Sync,
{
    async fn open(&self) -> Result<Box<dyn PageSession>, ObserveError> {
        let n = self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new((self.build)(n)))
    }
}
