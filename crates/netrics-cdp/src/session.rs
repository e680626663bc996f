//! CDP browser session: thin client over `tokio-tungstenite`.
//!
//! Only implements the CDP commands the observer needs (not the entire
//! protocol): domain enabling, navigation, script evaluation, and forwarding
//! of network and lifecycle events.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use netrics_observer::{EventStream, NetworkEvent, ObserveError, PageSession};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use crate::error::BrowserError;
use crate::events::decode_event;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Pending CDP command waiting for response.
type PendingTx = oneshot::Sender<Result<Value, String>>;

/// Where decoded protocol events go once someone subscribed.
///
/// Lifecycle events are held back until a navigation has been issued:
/// enabling them replays the current frame's events, `about:blank`
/// included.
#[derive(Default)]
struct EventSink {
    tx: Mutex<Option<mpsc::UnboundedSender<NetworkEvent>>>,
    navigating: AtomicBool,
}

impl EventSink {
    fn forward(&self, event: NetworkEvent) {
        if matches!(event, NetworkEvent::Lifecycle { .. })
            && !self.navigating.load(Ordering::Acquire)
        {
            return;
        }
        if let Some(tx) = self.tx.lock().as_ref() {
            let _ = tx.send(event);
        }
    }
}

/// Browser launch options.
#[derive(Clone, Debug)]
pub struct LaunchOptions {
    /// Viewport width in CSS pixels.
    pub window_width: u32,
    /// Viewport height in CSS pixels.
    pub window_height: u32,
    /// How long to wait for the `DevTools` endpoint.
    pub launch_timeout: Duration,
    /// Timeout for each protocol command.
    pub command_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 800,
            launch_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(30),
        }
    }
}

/// A single CDP browser session with its own Chrome process and profile.
pub struct CdpSession {
    cmd_tx: mpsc::Sender<CdpCommand>,
    events: Arc<EventSink>,
    command_timeout: Duration,
    chrome_process: tokio::sync::Mutex<Option<Child>>,
    profile_dir: Mutex<Option<TempDir>>,
    handler: JoinHandle<()>,
}

/// Internal CDP command message.
struct CdpCommand {
    method: String,
    params: Value,
    response_tx: PendingTx,
}

impl CdpSession {
    /// Launch a headless Chrome with a throwaway profile and connect via CDP.
    pub async fn launch(chrome_path: &Path, options: &LaunchOptions) -> Result<Self, BrowserError> {
        // Find a free port
        let listener = std::net::TcpListener::bind("127.0.0.1:0").map_err(|e| {
            BrowserError::LaunchFailed {
                context: format!("bind port: {e}"),
            }
        })?;
        let port = listener
            .local_addr()
            .map_err(|e| BrowserError::LaunchFailed {
                context: format!("local_addr: {e}"),
            })?
            .port();
        drop(listener);

        let profile_dir = tempfile::Builder::new()
            .prefix("netrics-profile-")
            .tempdir()
            .map_err(|e| BrowserError::LaunchFailed {
                context: format!("profile dir: {e}"),
            })?;

        let mut child = Command::new(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg(format!("--user-data-dir={}", profile_dir.path().display()))
            .arg(format!("--remote-debugging-port={port}"))
            .arg(format!(
                "--window-size={},{}",
                options.window_width, options.window_height
            ))
            .arg("about:blank")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BrowserError::LaunchFailed {
                context: e.to_string(),
            })?;

        let ws_url = wait_for_ws_url(port, &mut child, options.launch_timeout).await?;

        let (ws, _) = connect_async(ws_url.as_str())
            .await
            .map_err(|e| BrowserError::LaunchFailed {
                context: format!("WebSocket connect: {e}"),
            })?;

        let events = Arc::new(EventSink::default());
        let (cmd_tx, cmd_rx) = mpsc::channel::<CdpCommand>(64);
        let handler = tokio::spawn(cdp_handler_loop(ws, cmd_rx, Arc::clone(&events)));
        debug!(port, "browser session launched");

        Ok(Self {
            cmd_tx,
            events,
            command_timeout: options.command_timeout,
            chrome_process: tokio::sync::Mutex::new(Some(child)),
            profile_dir: Mutex::new(Some(profile_dir)),
            handler,
        })
    }

    // ─── CDP command helper ──────────────────────────────────────────────

    async fn send_cdp(&self, method: &str, params: Value) -> Result<Value, BrowserError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(CdpCommand {
                method: method.into(),
                params,
                response_tx: tx,
            })
            .await
            .map_err(|_| BrowserError::ConnectionClosed)?;

        let timeout_ms = u64::try_from(self.command_timeout.as_millis()).unwrap_or(u64::MAX);
        let result = tokio::time::timeout(self.command_timeout, rx)
            .await
            .map_err(|_| BrowserError::Timeout {
                timeout_ms,
                context: format!("CDP {method}"),
            })?
            .map_err(|_| BrowserError::ConnectionClosed)?;

        result.map_err(BrowserError::Cdp)
    }

    // ─── Events ──────────────────────────────────────────────────────────

    /// Start forwarding events and enable the domains that produce them.
    async fn enable_events(&self) -> Result<mpsc::UnboundedReceiver<NetworkEvent>, BrowserError> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.events.tx.lock() = Some(tx);

        let _ = self.send_cdp("Network.enable", json!({})).await?;
        let _ = self.send_cdp("Page.enable", json!({})).await?;
        let _ = self
            .send_cdp("Page.setLifecycleEventsEnabled", json!({ "enabled": true }))
            .await?;
        Ok(rx)
    }

    // ─── Navigation ──────────────────────────────────────────────────────

    /// Navigate to a URL. `Page.navigate` answers once the navigation is
    /// committed or failed; a failure carries `errorText`.
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.events.navigating.store(true, Ordering::Release);
        let result = self
            .send_cdp("Page.navigate", json!({ "url": url }))
            .await
            .map_err(|e| navigation_error(url, e))?;
        if let Some(error_text) = result["errorText"].as_str().filter(|t| !t.is_empty()) {
            return Err(BrowserError::NavigationFailed {
                url: url.into(),
                reason: error_text.into(),
            });
        }
        Ok(())
    }

    // ─── Helpers ─────────────────────────────────────────────────────────

    async fn eval(&self, expression: &str) -> Result<Value, BrowserError> {
        let result = self
            .send_cdp(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        if let Some(exception) = result.get("exceptionDetails") {
            let msg = exception["exception"]["description"]
                .as_str()
                .or_else(|| exception["text"].as_str())
                .unwrap_or("evaluation error");
            return Err(BrowserError::EvaluationFailed { reason: msg.into() });
        }
        Ok(result["result"]["value"].clone())
    }

    /// Kill the browser process and remove its profile.
    async fn shutdown(&self) {
        let _ = self.events.tx.lock().take();
        if let Some(mut child) = self.chrome_process.lock().await.take() {
            let _ = child.kill().await;
        }
        self.handler.abort();
        if let Some(dir) = self.profile_dir.lock().take() {
            if let Err(e) = dir.close() {
                debug!(error = %e, "failed to remove browser profile");
            }
        }
    }
}

#[async_trait]
impl PageSession for CdpSession {
    async fn subscribe(&self) -> Result<EventStream, ObserveError> {
        let rx = self.enable_events().await?;
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });
        Ok(stream.boxed())
    }

    async fn navigate(&self, url: &str) -> Result<(), ObserveError> {
        self.goto(url).await.map_err(ObserveError::from)
    }

    async fn evaluate(&self, expression: &str) -> Result<String, ObserveError> {
        let value = self.eval(expression).await?;
        match value {
            Value::String(s) => Ok(s),
            Value::Null => Err(BrowserError::EvaluationFailed {
                reason: "script returned no value".into(),
            }
            .into()),
            other => Ok(other.to_string()),
        }
    }

    async fn close(&self) -> Result<(), ObserveError> {
        self.shutdown().await;
        Ok(())
    }
}

/// A protocol-level rejection of `Page.navigate` (bad URL, blocked scheme)
/// is a navigation failure; transport faults stay as they are.
fn navigation_error(url: &str, err: BrowserError) -> BrowserError {
    match err {
        BrowserError::Cdp(reason) => BrowserError::NavigationFailed {
            url: url.into(),
            reason,
        },
        other => other,
    }
}

/// Poll the `DevTools` `/json` endpoint until Chrome lists a page target.
async fn wait_for_ws_url(
    port: u16,
    child: &mut Child,
    launch_timeout: Duration,
) -> Result<String, BrowserError> {
    const POLL: Duration = Duration::from_millis(100);
    let url = format!("http://127.0.0.1:{port}/json");
    let attempts = (launch_timeout.as_millis() / POLL.as_millis()).max(1);

    for _ in 0..attempts {
        tokio::time::sleep(POLL).await;

        // Check Chrome hasn't crashed
        if let Some(status) = child.try_wait().map_err(|e| BrowserError::LaunchFailed {
            context: format!("wait: {e}"),
        })? {
            return Err(BrowserError::LaunchFailed {
                context: format!("Chrome exited early with {status}"),
            });
        }

        let Ok(resp) = reqwest::get(&url).await else {
            continue;
        };
        let Ok(targets): Result<Vec<Value>, _> = resp.json().await else {
            continue;
        };
        if let Some(ws_url) = page_ws_url(&targets) {
            return Ok(ws_url);
        }
    }

    Err(BrowserError::LaunchFailed {
        context: format!(
            "Chrome did not expose a page target within {}ms on port {port}",
            launch_timeout.as_millis()
        ),
    })
}

/// WebSocket URL of the first page target in a `/json` listing.
fn page_ws_url(targets: &[Value]) -> Option<String> {
    targets
        .iter()
        .filter(|t| t["type"].as_str().is_none_or(|kind| kind == "page"))
        .find_map(|t| t["webSocketDebuggerUrl"].as_str())
        .map(String::from)
}

/// CDP WebSocket handler loop.
///
/// Receives commands from `CdpSession`, sends them over WS, and routes
/// responses back. Protocol events are decoded and forwarded to the
/// subscriber, if any.
async fn cdp_handler_loop(
    ws: WsStream,
    mut cmd_rx: mpsc::Receiver<CdpCommand>,
    events: Arc<EventSink>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let mut pending: HashMap<u64, PendingTx> = HashMap::new();
    let mut next_id: u64 = 1;

    loop {
        tokio::select! {
            // Incoming command from CdpSession
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                let id = next_id;
                next_id += 1;
                let msg = json!({
                    "id": id,
                    "method": cmd.method,
                    "params": cmd.params,
                });
                let _ = pending.insert(id, cmd.response_tx);
                if ws_tx.send(Message::Text(msg.to_string().into())).await.is_err() {
                    break;
                }
            }
            // Incoming message from Chrome
            msg = ws_rx.next() => {
                let Some(Ok(msg)) = msg else { break };
                let Message::Text(text) = msg else { continue };
                let Ok(val): Result<Value, _> = serde_json::from_str(&text) else {
                    continue;
                };
                route_message(&val, &mut pending, &events);
            }
        }
    }

    // Dropping the sender ends the subscriber's stream.
    let _ = events.tx.lock().take();
    trace!("CDP handler loop exited");
}

fn route_message(val: &Value, pending: &mut HashMap<u64, PendingTx>, events: &EventSink) {
    if let Some(id) = val.get("id").and_then(Value::as_u64) {
        if let Some(tx) = pending.remove(&id) {
            if let Some(err) = val.get("error") {
                let msg = err["message"].as_str().unwrap_or("CDP error");
                let _ = tx.send(Err(msg.into()));
            } else {
                let _ = tx.send(Ok(val["result"].clone()));
            }
        }
        return;
    }

    let Some(method) = val.get("method").and_then(Value::as_str) else {
        return;
    };
    if let Some(event) = decode_event(method, &val["params"]) {
        events.forward(event);
    }
}
