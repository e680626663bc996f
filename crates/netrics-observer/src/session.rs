//! Browser session seam.
//!
//! The engine never talks to a browser directly. A [`SessionSource`] opens a
//! fresh [`PageSession`] per observation; the session delivers
//! [`NetworkEvent`]s in the order the browser emitted them and performs
//! navigation and in-page evaluation.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::ObserveError;
use crate::types::NetworkEvent;

/// Stream of events from one session. Ends when the session closes.
pub type EventStream = BoxStream<'static, NetworkEvent>;

/// One controlled browser page.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Subscribe to network and lifecycle events. Called once, before
    /// navigation.
    async fn subscribe(&self) -> Result<EventStream, ObserveError>;

    /// Navigate to `url`. Returns once the browser accepted the navigation.
    async fn navigate(&self, url: &str) -> Result<(), ObserveError>;

    /// Evaluate a script in the page and return its value as a string.
    async fn evaluate(&self, expression: &str) -> Result<String, ObserveError>;

    /// Release the session and everything it holds.
    async fn close(&self) -> Result<(), ObserveError>;
}

/// Opens page sessions.
#[async_trait]
pub trait SessionSource: Send + Sync {
    /// Open a fresh session.
    async fn open(&self) -> Result<Box<dyn PageSession>, ObserveError>;
}
