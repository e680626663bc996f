//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file only needs to mention the fields it changes.

use std::time::Duration;

use netrics_observer::{ObserverConfig, SettleMode};
use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// ```json
/// {
///   "observer": { "settleMode": "lifecycle", "lifecycleQuietMs": 1500 },
///   "manifest": { "manifestPath": "out/manifest.json" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetricsSettings {
    /// Page-load observation tuning.
    pub observer: ObserverSettings,
    /// Browser launch options.
    pub browser: BrowserSettings,
    /// Manifest file locations and refresh policy.
    pub manifest: ManifestSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

/// Page-load observation settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObserverSettings {
    /// Which signals may start the idle countdown.
    pub settle_mode: SettleMode,
    /// Quiet period used in [`SettleMode::Lifecycle`].
    pub lifecycle_quiet_ms: u64,
    /// Quiet period used in [`SettleMode::Corroborated`].
    pub corroborated_quiet_ms: u64,
    /// Hard upper bound on one page-load session.
    pub session_deadline_ms: u64,
    /// Resolve the page favicon once settled.
    pub resolve_favicon: bool,
}

impl Default for ObserverSettings {
    fn default() -> Self {
        Self {
            settle_mode: SettleMode::Corroborated,
            lifecycle_quiet_ms: 1_000,
            corroborated_quiet_ms: 3_000,
            session_deadline_ms: 60_000,
            resolve_favicon: true,
        }
    }
}

impl ObserverSettings {
    /// Quiet period for the configured settle mode.
    pub fn quiet_ms(&self) -> u64 {
        match self.settle_mode {
            SettleMode::Lifecycle => self.lifecycle_quiet_ms,
            SettleMode::Corroborated => self.corroborated_quiet_ms,
        }
    }

    /// Build the engine configuration these settings describe.
    pub fn to_config(&self) -> ObserverConfig {
        ObserverConfig {
            settle_mode: self.settle_mode,
            quiet_period: Duration::from_millis(self.quiet_ms()),
            session_deadline: Duration::from_millis(self.session_deadline_ms),
            resolve_favicon: self.resolve_favicon,
        }
    }
}

/// Browser launch settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowserSettings {
    /// Explicit Chrome/Chromium binary. Discovered when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<String>,
    /// Viewport width in CSS pixels.
    pub window_width: u32,
    /// Viewport height in CSS pixels.
    pub window_height: u32,
    /// How long to wait for the `DevTools` endpoint after launch.
    pub launch_timeout_ms: u64,
    /// Timeout for a single protocol command.
    pub command_timeout_ms: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            chrome_path: None,
            window_width: 1280,
            window_height: 800,
            launch_timeout_ms: 5_000,
            command_timeout_ms: 30_000,
        }
    }
}

/// Manifest file settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManifestSettings {
    /// Site list consumed by a full rebuild.
    pub input_path: String,
    /// Manifest file written by rebuilds and refreshes.
    pub manifest_path: String,
    /// Entries updated more recently than this are left alone.
    pub stale_after_secs: u64,
}

impl Default for ManifestSettings {
    fn default() -> Self {
        Self {
            input_path: "input.json".to_string(),
            manifest_path: "manifest.json".to_string(),
            stale_after_secs: 3_600,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
