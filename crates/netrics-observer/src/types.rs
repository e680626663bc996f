//! Event and output types.
//!
//! [`NetworkEvent`] is what a browser session delivers; [`Website`] and
//! [`Resource`] are what an observation produces. The output types carry
//! the manifest wire format:
//!
//! ```json
//! {
//!   "url": "https://example.com",
//!   "favicon": "https://example.com/favicon.ico",
//!   "resources": [
//!     { "url": "https://example.com/", "content_type": "Document", "order": 1, "dependencies": [] },
//!     { "url": "https://example.com/app.js", "content_type": "Script", "order": 2, "dependencies": [1] }
//!   ],
//!   "updated": "2024-05-01T12:00:00Z"
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle event name that reports the browser's own network idle.
pub const NETWORK_IDLE: &str = "networkIdle";

/// A network-activity or lifecycle event from one browser session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkEvent {
    /// A request is about to be sent.
    RequestStarted {
        /// Browser-assigned request id, unique within the session.
        id: String,
        /// Request URL.
        url: String,
        /// HTTP method.
        method: String,
        /// Request headers with string values.
        headers: BTreeMap<String, String>,
        /// Request body, if any.
        post_data: Option<String>,
        /// Resource classification (`Document`, `Script`, `Image`, ...).
        resource_type: String,
    },
    /// A request completed loading.
    RequestFinished {
        /// Request id.
        id: String,
        /// Bytes received over the wire.
        encoded_size: u64,
    },
    /// A request failed.
    RequestFailed {
        /// Request id.
        id: String,
    },
    /// A page lifecycle event (`init`, `load`, `networkIdle`, ...).
    Lifecycle {
        /// Lifecycle event name.
        name: String,
    },
}

impl NetworkEvent {
    /// Whether this is the browser's network-idle lifecycle signal.
    pub fn is_network_idle(&self) -> bool {
        matches!(self, Self::Lifecycle { name } if name == NETWORK_IDLE)
    }
}

/// One fetched resource in load order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Request URL.
    pub url: String,
    /// Resource classification reported by the browser.
    pub content_type: String,
    /// Rank in which the request was first seen starting (1-based).
    pub order: u64,
    /// Orders of kept requests already finished when this one started,
    /// in completion order.
    #[serde(default)]
    pub dependencies: Vec<u64>,
    /// The request as an equivalent `curl` command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curl: Option<String>,
}

/// Summary of one page load.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Website {
    /// The navigated URL.
    pub url: String,
    /// Absolute favicon URL.
    #[serde(default)]
    pub favicon: String,
    /// Kept resources, ascending by `order`.
    #[serde(default)]
    pub resources: Vec<Resource>,
    /// RFC 3339 UTC time the summary was generated.
    #[serde(default)]
    pub updated: String,
}

impl Website {
    /// Parse `updated`, or `None` when it is missing or malformed.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.updated)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Format a timestamp the way `Website::updated` stores it.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Phase of one page-load session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObservePhase {
    /// Navigation issued, waiting for the browser to accept it.
    Navigating,
    /// Navigation accepted, waiting for the idle timer.
    WaitingForIdle,
    /// The idle timer fired.
    Settled,
}

impl fmt::Display for ObservePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Navigating => "navigating",
            Self::WaitingForIdle => "waiting_for_idle",
            Self::Settled => "settled",
        };
        f.write_str(name)
    }
}
