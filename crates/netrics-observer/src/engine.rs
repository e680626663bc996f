//! Page-load observation engine.
//!
//! One [`Observer::observe`] call drives one session through
//! `Navigating → WaitingForIdle → Settled`:
//!
//! 1. A fresh [`IdleTimer`] and [`RequestLedger`] are created.
//! 2. The session's event stream is pumped into the ledger by a task.
//! 3. Navigation is issued.
//! 4. The engine waits for the idle timer, racing the hard session deadline
//!    and the caller's cancellation token.
//! 5. The favicon is resolved in-page (optional), still bounded by the same
//!    deadline and token.
//! 6. The kept requests become the `Website`'s resources.
//!
//! The pump task and the timer are torn down on every exit path.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::curl::to_curl;
use crate::error::ObserveError;
use crate::idle_timer::IdleTimer;
use crate::ledger::{RequestLedger, SettleMode};
use crate::session::{EventStream, PageSession};
use crate::types::{NetworkEvent, ObservePhase, Website, format_timestamp};

/// In-page script resolving the favicon: the first `rel~=icon` link, else
/// `/favicon.ico`, made absolute against the page location.
pub const FAVICON_SCRIPT: &str = r#"(() => {
    const link = document.querySelector('link[rel~="icon" i]');
    const href = (link && link.getAttribute('href')) || '/favicon.ico';
    return new URL(href, window.location.href).href;
})()"#;

/// Engine tuning.
#[derive(Clone, Debug)]
pub struct ObserverConfig {
    /// Which signals may start the idle countdown.
    pub settle_mode: SettleMode,
    /// Quiet period before the page counts as settled.
    pub quiet_period: Duration,
    /// Hard upper bound on the whole session.
    pub session_deadline: Duration,
    /// Resolve the favicon once settled.
    pub resolve_favicon: bool,
}

impl ObserverConfig {
    /// Short quiet period, started only by the browser's network-idle event.
    pub fn lifecycle() -> Self {
        Self {
            settle_mode: SettleMode::Lifecycle,
            quiet_period: Duration::from_secs(1),
            session_deadline: Duration::from_secs(60),
            resolve_favicon: true,
        }
    }

    /// Longer quiet period, also started whenever nothing is pending.
    pub fn corroborated() -> Self {
        Self {
            settle_mode: SettleMode::Corroborated,
            quiet_period: Duration::from_secs(3),
            session_deadline: Duration::from_secs(60),
            resolve_favicon: true,
        }
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self::corroborated()
    }
}

/// Observes page loads and summarizes them.
#[derive(Clone, Debug, Default)]
pub struct Observer {
    config: ObserverConfig,
}

impl Observer {
    /// Create an observer with the given configuration.
    pub fn new(config: ObserverConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &ObserverConfig {
        &self.config
    }

    /// Observe one page load without external cancellation.
    pub async fn observe(
        &self,
        session: &dyn PageSession,
        url: &str,
    ) -> Result<Website, ObserveError> {
        self.observe_with_cancel(session, url, &CancellationToken::new())
            .await
    }

    /// Observe one page load, aborting when `cancel` fires.
    pub async fn observe_with_cancel(
        &self,
        session: &dyn PageSession,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Website, ObserveError> {
        let deadline = Instant::now() + self.config.session_deadline;
        let timer = Arc::new(IdleTimer::new(self.config.quiet_period));
        let ledger = Arc::new(RequestLedger::new(
            Arc::clone(&timer),
            self.config.settle_mode,
        ));

        let events = session.subscribe().await?;
        let pump = tokio::spawn(pump_events(events, Arc::clone(&ledger)));

        let settled = self
            .settle(session, url, &ledger, &timer, cancel, deadline)
            .await;
        pump.abort();
        timer.stop();
        settled?;

        let stats = ledger.stats();
        info!(
            url,
            phase = %ObservePhase::Settled,
            sent = stats.sent,
            finished = stats.finished,
            failed = stats.failed,
            pending = stats.pending(),
            "page settled"
        );

        let favicon = if self.config.resolve_favicon {
            favicon_within(session, url, cancel, deadline).await?
        } else {
            String::new()
        };

        Ok(Website {
            url: url.to_string(),
            favicon,
            resources: ledger.snapshot_kept(),
            updated: format_timestamp(Utc::now()),
        })
    }

    async fn settle(
        &self,
        session: &dyn PageSession,
        url: &str,
        ledger: &RequestLedger,
        timer: &IdleTimer,
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> Result<(), ObserveError> {
        let run = async {
            debug!(url, phase = %ObservePhase::Navigating, "navigating");
            session.navigate(url).await?;
            debug!(
                url,
                phase = %ObservePhase::WaitingForIdle,
                quiet_ms = u64::try_from(timer.quiet_period().as_millis()).unwrap_or(u64::MAX),
                "waiting for page to settle"
            );
            ledger.arm_if_quiet();
            timer.wait().await;
            Ok::<(), ObserveError>(())
        };

        tokio::select! {
            () = cancel.cancelled() => {
                warn!(url, "observation cancelled");
                Err(ObserveError::Cancelled)
            }
            outcome = tokio::time::timeout_at(deadline, run) => match outcome {
                Ok(result) => result,
                Err(_) => {
                    let stats = ledger.stats();
                    warn!(url, pending = stats.pending(), "session deadline elapsed before page settled");
                    Err(ObserveError::Deadline {
                        url: url.to_string(),
                        timeout_ms: u64::try_from(self.config.session_deadline.as_millis())
                            .unwrap_or(u64::MAX),
                    })
                }
            },
        }
    }
}

/// Route session events into the ledger until the stream ends.
async fn pump_events(mut events: EventStream, ledger: Arc<RequestLedger>) {
    while let Some(event) = events.next().await {
        apply_event(&ledger, event);
    }
    trace!("event stream ended");
}

fn apply_event(ledger: &RequestLedger, event: NetworkEvent) {
    if event.is_network_idle() {
        ledger.on_lifecycle_idle();
        return;
    }
    match event {
        NetworkEvent::RequestStarted {
            id,
            url,
            method,
            headers,
            post_data,
            resource_type,
        } => {
            let curl = to_curl(&method, &url, &headers, post_data.as_deref());
            let _ = ledger.on_start(&id, &url, &method, &resource_type, curl);
        }
        NetworkEvent::RequestFinished { id, encoded_size } => ledger.on_finish(&id, encoded_size),
        NetworkEvent::RequestFailed { id } => ledger.on_fail(&id),
        NetworkEvent::Lifecycle { name } => trace!(name = %name, "lifecycle event"),
    }
}

/// [`resolve_favicon`] under the session's deadline and cancellation.
/// Running out of time falls back to the default path.
async fn favicon_within(
    session: &dyn PageSession,
    url: &str,
    cancel: &CancellationToken,
    deadline: Instant,
) -> Result<String, ObserveError> {
    tokio::select! {
        () = cancel.cancelled() => {
            warn!(url, "observation cancelled during favicon lookup");
            Err(ObserveError::Cancelled)
        }
        found = tokio::time::timeout_at(deadline, resolve_favicon(session, url)) => {
            Ok(found.unwrap_or_else(|_| {
                warn!(url, "session deadline elapsed during favicon lookup, using default path");
                default_favicon(url)
            }))
        }
    }
}

async fn resolve_favicon(session: &dyn PageSession, url: &str) -> String {
    match session.evaluate(FAVICON_SCRIPT).await {
        Ok(favicon) if !favicon.is_empty() => favicon,
        Ok(_) => default_favicon(url),
        Err(e) => {
            warn!(url, error = %e, "favicon lookup failed, using default path");
            default_favicon(url)
        }
    }
}

/// `/favicon.ico` on the navigated URL's origin, or empty if unparsable.
fn default_favicon(url: &str) -> String {
    Url::parse(url)
        .and_then(|base| base.join("/favicon.ico"))
        .map(String::from)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use assert_matches::assert_matches;
    use tokio::time::Instant;

    use super::*;
    use crate::testutil::{ScriptedSession, failed, finished, network_idle, started};

    const URL: &str = "https://example.com/";

    fn observer(mode: SettleMode) -> Observer {
        let config = match mode {
            SettleMode::Lifecycle => ObserverConfig::lifecycle(),
            SettleMode::Corroborated => ObserverConfig::corroborated(),
        };
        Observer::new(config)
    }

    #[tokio::test(start_paused = true)]
    async fn zero_request_page_settles_empty() {
        let session = ScriptedSession::new(vec![]);
        let site = observer(SettleMode::Corroborated)
            .observe(&session, URL)
            .await
            .unwrap();
        assert_eq!(site.url, URL);
        assert!(site.resources.is_empty());
        assert_eq!(site.favicon, "https://example.com/favicon.ico");
        assert!(site.updated_at().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_request_page_settles_on_lifecycle_idle() {
        let session = ScriptedSession::new(vec![network_idle()]);
        let site = observer(SettleMode::Lifecycle)
            .observe(&session, URL)
            .await
            .unwrap();
        assert!(site.resources.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn builds_ordered_manifest_with_dependencies() {
        let session = ScriptedSession::new(vec![
            started("doc", URL, "Document"),
            finished("doc"),
            started("js", "https://example.com/app.js", "Script"),
            started("pixel", "https://t.example.net/p.gif?a=1&b=2&c=3&d=4", "Image"),
            started("css", "https://example.com/app.css", "Stylesheet"),
            finished("css"),
            failed("pixel"),
            started("logo", "https://example.com/logo.png", "Image"),
            finished("js"),
            finished("logo"),
            network_idle(),
        ]);
        let site = observer(SettleMode::Corroborated)
            .observe(&session, URL)
            .await
            .unwrap();

        let summary: Vec<(&str, u64, Vec<u64>)> = site
            .resources
            .iter()
            .map(|r| (r.content_type.as_str(), r.order, r.dependencies.clone()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Document", 1, vec![]),
                ("Script", 2, vec![1]),
                ("Stylesheet", 4, vec![1]),
                ("Image", 5, vec![1, 4]),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn late_request_restarts_countdown() {
        let session = ScriptedSession::timed(vec![
            (Duration::ZERO, started("doc", URL, "Document")),
            (Duration::ZERO, finished("doc")),
            (Duration::from_secs(2), started("lazy", "https://example.com/lazy.js", "Script")),
            (Duration::from_millis(500), finished("lazy")),
        ]);
        let began = Instant::now();
        let site = observer(SettleMode::Corroborated)
            .observe(&session, URL)
            .await
            .unwrap();

        assert!(began.elapsed() >= Duration::from_millis(5_500));
        assert_eq!(site.resources.len(), 2);
        assert_eq!(site.resources[1].dependencies, vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn lifecycle_idle_unblocks_stuck_request() {
        let session = ScriptedSession::new(vec![
            started("doc", URL, "Document"),
            finished("doc"),
            started("poll", "https://example.com/poll", "XHR"),
            network_idle(),
        ]);
        let site = observer(SettleMode::Corroborated)
            .observe(&session, URL)
            .await
            .unwrap();
        assert_eq!(site.resources.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_is_reported_separately() {
        let session = ScriptedSession::new(vec![
            started("doc", URL, "Document"),
            started("poll", "https://example.com/poll", "XHR"),
            finished("doc"),
        ]);
        let err = observer(SettleMode::Corroborated)
            .observe(&session, URL)
            .await
            .unwrap_err();
        assert_matches!(err, ObserveError::Deadline { timeout_ms: 60_000, .. });
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_failure_is_propagated() {
        let session = ScriptedSession::new(vec![started("doc", URL, "Document")])
            .failing_navigation("net::ERR_NAME_NOT_RESOLVED");
        let err = observer(SettleMode::Lifecycle)
            .observe(&session, URL)
            .await
            .unwrap_err();
        assert_matches!(err, ObserveError::Navigation { reason, .. } if reason.contains("ERR_NAME"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_wait() {
        let session = ScriptedSession::new(vec![started("poll", URL, "Document")]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let _ = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let err = observer(SettleMode::Corroborated)
            .observe_with_cancel(&session, URL, &cancel)
            .await
            .unwrap_err();
        assert_matches!(err, ObserveError::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn favicon_falls_back_to_default_path() {
        let session = ScriptedSession::new(vec![network_idle()])
            .with_favicon(Err("Execution context was destroyed".into()));
        let site = observer(SettleMode::Lifecycle)
            .observe(&session, "https://example.com/deep/page.html")
            .await
            .unwrap();
        assert_eq!(site.favicon, "https://example.com/favicon.ico");
    }

    #[tokio::test(start_paused = true)]
    async fn favicon_lookup_can_be_disabled() {
        let session = ScriptedSession::new(vec![]);
        let mut config = ObserverConfig::corroborated();
        config.resolve_favicon = false;
        let site = Observer::new(config).observe(&session, URL).await.unwrap();
        assert_eq!(site.favicon, "");
        assert!(!session.closed_flag().load(Ordering::SeqCst), "observer does not own the session");
    }

    #[tokio::test(start_paused = true)]
    async fn hung_favicon_lookup_is_bounded_by_deadline() {
        let session = ScriptedSession::new(vec![network_idle()]).hanging_favicon();
        let began = Instant::now();
        let site = observer(SettleMode::Lifecycle)
            .observe(&session, URL)
            .await
            .unwrap();
        let elapsed = began.elapsed();
        assert!(elapsed >= Duration::from_secs(60) && elapsed < Duration::from_secs(61));
        assert_eq!(site.favicon, "https://example.com/favicon.ico");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_hung_favicon_lookup() {
        let session = ScriptedSession::new(vec![network_idle()]).hanging_favicon();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let _ = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            trigger.cancel();
        });

        let began = Instant::now();
        let err = observer(SettleMode::Lifecycle)
            .observe_with_cancel(&session, URL, &cancel)
            .await
            .unwrap_err();
        assert_matches!(err, ObserveError::Cancelled);
        let elapsed = began.elapsed();
        assert!(elapsed >= Duration::from_secs(10) && elapsed < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn resources_carry_curl_commands() {
        let session = ScriptedSession::new(vec![
            started("doc", URL, "Document"),
            finished("doc"),
            network_idle(),
        ]);
        let site = observer(SettleMode::Lifecycle)
            .observe(&session, URL)
            .await
            .unwrap();
        assert_eq!(
            site.resources[0].curl.as_deref(),
            Some("curl -X 'GET' 'https://example.com/'")
        );
    }

    #[test]
    fn default_favicon_uses_origin() {
        assert_eq!(
            default_favicon("https://example.com/a/b?c=d"),
            "https://example.com/favicon.ico"
        );
        assert_eq!(default_favicon("not a url"), "");
    }
}
