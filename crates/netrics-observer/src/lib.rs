//! # netrics-observer
//!
//! Page-load observation engine. Watches the network activity of one
//! browser page load and turns it into an ordered resource list:
//!
//! - [`IdleTimer`]: debounced, one-shot "page settled" signal
//! - [`RequestLedger`]: request lifecycle records, load order and
//!   dependency snapshots
//! - [`should_keep`]: noise filter for beacons, inline data and non-GET
//!   requests
//! - [`to_curl`]: each request rebuilt as an equivalent `curl` command
//! - [`Observer`]: drives one session from navigation to a [`Website`]
//! - [`Summarizer`]: opens a session per site and closes it afterwards

#![deny(unsafe_code)]

pub mod curl;
pub mod engine;
pub mod error;
pub mod filter;
pub mod idle_timer;
pub mod ledger;
pub mod session;
pub mod summarize;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use curl::to_curl;
pub use engine::{FAVICON_SCRIPT, Observer, ObserverConfig};
pub use error::ObserveError;
pub use filter::should_keep;
pub use idle_timer::IdleTimer;
pub use ledger::{LedgerStats, RequestLedger, RequestState, SettleMode};
pub use session::{EventStream, PageSession, SessionSource};
pub use summarize::{Summarize, Summarizer};
pub use types::{
    NETWORK_IDLE, NetworkEvent, ObservePhase, Resource, Website, format_timestamp,
};
