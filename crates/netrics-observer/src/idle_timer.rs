//! Restartable one-shot idle countdown.
//!
//! [`IdleTimer::start`] (re)arms a countdown of the quiet period,
//! [`IdleTimer::stop`] disarms it, and [`IdleTimer::wait`] suspends until a
//! countdown elapses untouched. The completion signal fires at most once per
//! timer; afterwards `start` and `stop` are no-ops. A fresh timer is created
//! for every page-load session.
//!
//! Each countdown runs as its own Tokio task tagged with an epoch. Restarting
//! or stopping bumps the epoch and aborts the task, so a countdown that
//! already woke up but lost the race for the lock cannot fire.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::trace;

/// Debounced "nothing happened for a while" signal.
pub struct IdleTimer {
    quiet: Duration,
    state: Arc<Mutex<TimerState>>,
    done: watch::Receiver<bool>,
}

struct TimerState {
    epoch: u64,
    running: bool,
    fired: bool,
    countdown: Option<JoinHandle<()>>,
    done_tx: watch::Sender<bool>,
}

impl IdleTimer {
    /// Create a stopped timer with the given quiet period.
    pub fn new(quiet: Duration) -> Self {
        let (done_tx, done) = watch::channel(false);
        Self {
            quiet,
            state: Arc::new(Mutex::new(TimerState {
                epoch: 0,
                running: false,
                fired: false,
                countdown: None,
                done_tx,
            })),
            done,
        }
    }

    /// The configured quiet period.
    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    /// Start the countdown, or push its deadline to now + quiet period if it
    /// is already running. Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let mut state = self.state.lock();
        if state.fired {
            return;
        }
        if let Some(countdown) = state.countdown.take() {
            countdown.abort();
        }
        state.epoch += 1;
        state.running = true;

        let epoch = state.epoch;
        let quiet = self.quiet;
        let shared = Arc::clone(&self.state);
        state.countdown = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            let mut state = shared.lock();
            if state.epoch != epoch || !state.running || state.fired {
                return;
            }
            state.running = false;
            state.fired = true;
            state.countdown = None;
            let _ = state.done_tx.send_replace(true);
            trace!(epoch, "idle timer fired");
        }));
    }

    /// Cancel any pending countdown without firing. Safe when not running.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if state.fired {
            return;
        }
        if let Some(countdown) = state.countdown.take() {
            countdown.abort();
        }
        state.epoch += 1;
        state.running = false;
    }

    /// Whether a countdown is currently armed.
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Whether the completion signal has fired.
    pub fn has_fired(&self) -> bool {
        *self.done.borrow()
    }

    /// Suspend until the timer fires. Returns immediately if it already has.
    pub async fn wait(&self) {
        let mut done = self.done.clone();
        // The sender lives as long as `self`, so this cannot observe a close.
        let _ = done.wait_for(|fired| *fired).await;
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        if let Some(countdown) = self.state.lock().countdown.take() {
            countdown.abort();
        }
    }
}

impl std::fmt::Debug for IdleTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("IdleTimer")
            .field("quiet", &self.quiet)
            .field("running", &state.running)
            .field("fired", &state.fired)
            .finish()
    }
}
