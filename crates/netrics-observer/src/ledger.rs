//! Request ledger: per-session lifecycle records, load order and dependency
//! snapshots.
//!
//! Every operation runs under one mutex for its whole critical section,
//! including the idle-timer transitions it triggers, so the order counter,
//! the finished list and the pending count always agree with each other.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::filter::should_keep;
use crate::idle_timer::IdleTimer;
use crate::types::Resource;

/// Which signals may start the idle countdown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettleMode {
    /// Only the browser's network-idle lifecycle event starts the timer.
    /// Pairs with a short quiet period.
    Lifecycle,
    /// The lifecycle event and the pending count reaching zero both start
    /// the timer. Pairs with a longer quiet period.
    #[default]
    Corroborated,
}

/// Terminal state of a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestState {
    /// Started, no terminal event yet.
    Pending,
    /// Loaded successfully.
    Finished {
        /// Bytes received over the wire.
        encoded_size: u64,
    },
    /// Failed to load.
    Failed,
}

/// Lifecycle record for one request id.
#[derive(Clone, Debug)]
struct RequestRecord {
    url: String,
    resource_type: String,
    order: u64,
    dependencies: Vec<u64>,
    curl: Option<String>,
    keep: bool,
    state: RequestState,
}

/// Request counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LedgerStats {
    /// Distinct requests started.
    pub sent: u64,
    /// Requests finished.
    pub finished: u64,
    /// Requests failed.
    pub failed: u64,
}

impl LedgerStats {
    /// Requests without a terminal event.
    pub fn pending(&self) -> u64 {
        self.sent.saturating_sub(self.finished + self.failed)
    }
}

#[derive(Default)]
struct LedgerState {
    records: HashMap<String, RequestRecord>,
    last_order: u64,
    finished_kept: Vec<u64>,
    stats: LedgerStats,
}

/// Concurrency-safe request ledger for one page-load session.
pub struct RequestLedger {
    mode: SettleMode,
    timer: Arc<IdleTimer>,
    state: Mutex<LedgerState>,
}

impl RequestLedger {
    /// Create an empty ledger driving `timer`.
    pub fn new(timer: Arc<IdleTimer>, mode: SettleMode) -> Self {
        Self {
            mode,
            timer,
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Record a request start.
    ///
    /// Returns the assigned order, or `None` for a duplicate start of an id
    /// already in the ledger (redirect hops reuse the id). Any start cancels
    /// a pending idle countdown. A request without a `curl` reconstruction
    /// is counted but never kept.
    pub fn on_start(
        &self,
        id: &str,
        url: &str,
        method: &str,
        resource_type: &str,
        curl: Option<String>,
    ) -> Option<u64> {
        let mut state = self.state.lock();
        self.timer.stop();

        if state.records.contains_key(id) {
            debug!(id, url, "duplicate request start ignored");
            return None;
        }

        state.last_order += 1;
        let order = state.last_order;
        if curl.is_none() {
            debug!(id, url, method, "request cannot be reconstructed, dropping from output");
        }
        let keep = curl.is_some() && should_keep(method, url, resource_type);
        let record = RequestRecord {
            url: url.to_string(),
            resource_type: resource_type.to_string(),
            order,
            dependencies: state.finished_kept.clone(),
            curl,
            keep,
            state: RequestState::Pending,
        };
        let _ = state.records.insert(id.to_string(), record);
        state.stats.sent += 1;

        debug!(id, url, order, keep, pending = state.stats.pending(), "request started");
        Some(order)
    }

    /// Record a successful load.
    pub fn on_finish(&self, id: &str, encoded_size: u64) {
        let mut state = self.state.lock();
        let state = &mut *state;

        let Some(record) = state.records.get_mut(id) else {
            debug!(id, "finish for unknown request ignored");
            return;
        };
        if record.state != RequestState::Pending {
            debug!(id, "finish for settled request ignored");
            return;
        }
        record.state = RequestState::Finished { encoded_size };
        if record.keep {
            state.finished_kept.push(record.order);
        }
        state.stats.finished += 1;

        debug!(id, order = record.order, encoded_size, pending = state.stats.pending(), "request finished");
        self.settle_if_quiet(&state.stats);
    }

    /// Record a failed load. Failed requests never become dependencies.
    pub fn on_fail(&self, id: &str) {
        let mut state = self.state.lock();
        let state = &mut *state;

        let Some(record) = state.records.get_mut(id) else {
            debug!(id, "failure for unknown request ignored");
            return;
        };
        if record.state != RequestState::Pending {
            debug!(id, "failure for settled request ignored");
            return;
        }
        record.state = RequestState::Failed;
        state.stats.failed += 1;

        debug!(id, order = record.order, pending = state.stats.pending(), "request failed");
        self.settle_if_quiet(&state.stats);
    }

    /// The browser reported network idle: start the countdown regardless of
    /// the pending count.
    pub fn on_lifecycle_idle(&self) {
        let state = self.state.lock();
        debug!(pending = state.stats.pending(), "browser reported network idle");
        self.timer.start();
    }

    /// Start the countdown if nothing is pending. Called once navigation
    /// returns so a page that never issues a request still settles.
    pub fn arm_if_quiet(&self) {
        let state = self.state.lock();
        self.settle_if_quiet(&state.stats);
    }

    /// Current counters.
    pub fn stats(&self) -> LedgerStats {
        self.state.lock().stats
    }

    /// Kept requests as resources, ascending by order.
    ///
    /// Failed requests are excluded; pending ones are included since they
    /// were observed starting.
    pub fn snapshot_kept(&self) -> Vec<Resource> {
        let state = self.state.lock();
        let mut resources: Vec<Resource> = state
            .records
            .values()
            .filter(|r| r.keep && r.state != RequestState::Failed)
            .map(|r| Resource {
                url: r.url.clone(),
                content_type: r.resource_type.clone(),
                order: r.order,
                dependencies: r.dependencies.clone(),
                curl: r.curl.clone(),
            })
            .collect();
        resources.sort_by_key(|r| r.order);
        resources
    }

    /// Caller holds the state lock.
    fn settle_if_quiet(&self, stats: &LedgerStats) {
        if self.mode == SettleMode::Corroborated && stats.pending() == 0 {
            debug!(sent = stats.sent, "no requests outstanding, starting idle countdown");
            self.timer.start();
        }
    }
}

impl std::fmt::Debug for RequestLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLedger")
            .field("mode", &self.mode)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
