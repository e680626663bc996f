//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`NetricsSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Validate values the engine cannot run with
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::NetricsSettings;

/// Resolve the path to the settings file.
///
/// `$NETRICS_HOME/settings.json` when set, otherwise `~/.netrics/settings.json`.
pub fn settings_path() -> PathBuf {
    if let Some(home) = read_env_string("NETRICS_HOME") {
        return PathBuf::from(home).join("settings.json");
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".netrics").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<NetricsSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<NetricsSettings> {
    load_settings_with(path, |name| std::env::var(name).ok())
}

/// Load settings from `path`, resolving overrides through `lookup`.
pub fn load_settings_with<F>(path: &Path, lookup: F) -> Result<NetricsSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(NetricsSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: NetricsSettings = serde_json::from_value(merged)?;
    apply_overrides(&mut settings, lookup);
    validate(&settings)?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply overrides resolved through `lookup`.
///
/// Invalid values are ignored with a warning (fall back to file/default).
pub fn apply_overrides<F>(settings: &mut NetricsSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Observer ────────────────────────────────────────────────────
    if let Some(v) = env.string("NETRICS_SETTLE_MODE") {
        match serde_json::from_value(Value::String(v.to_lowercase())) {
            Ok(mode) => settings.observer.settle_mode = mode,
            Err(_) => tracing::warn!(key = "NETRICS_SETTLE_MODE", value = %v, "unknown settle mode, ignoring"),
        }
    }
    if let Some(v) = env.u64("NETRICS_LIFECYCLE_QUIET_MS", 10, 600_000) {
        settings.observer.lifecycle_quiet_ms = v;
    }
    if let Some(v) = env.u64("NETRICS_CORROBORATED_QUIET_MS", 10, 600_000) {
        settings.observer.corroborated_quiet_ms = v;
    }
    if let Some(v) = env.u64("NETRICS_SESSION_DEADLINE_MS", 1_000, 3_600_000) {
        settings.observer.session_deadline_ms = v;
    }
    if let Some(v) = env.bool("NETRICS_RESOLVE_FAVICON") {
        settings.observer.resolve_favicon = v;
    }

    // ── Browser ─────────────────────────────────────────────────────
    if let Some(v) = env.string("CHROME_PATH") {
        settings.browser.chrome_path = Some(v);
    }

    // ── Manifest ────────────────────────────────────────────────────
    if let Some(v) = env.string("NETRICS_INPUT_PATH") {
        settings.manifest.input_path = v;
    }
    if let Some(v) = env.string("NETRICS_MANIFEST_PATH") {
        settings.manifest.manifest_path = v;
    }
    if let Some(v) = env.u64("NETRICS_STALE_AFTER_SECS", 0, 31_536_000) {
        settings.manifest.stale_after_secs = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("NETRICS_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

/// Reject values the observer cannot operate with.
pub fn validate(settings: &NetricsSettings) -> Result<()> {
    let observer = &settings.observer;
    if observer.quiet_ms() == 0 {
        return Err(SettingsError::InvalidValue(
            "quiet period must be positive".into(),
        ));
    }
    if observer.session_deadline_ms <= observer.quiet_ms() {
        return Err(SettingsError::InvalidValue(format!(
            "sessionDeadlineMs ({}) must exceed the quiet period ({})",
            observer.session_deadline_ms,
            observer.quiet_ms()
        )));
    }
    Ok(())
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use netrics_observer::SettleMode;

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({
            "observer": {"lifecycleQuietMs": 1000, "resolveFavicon": true}
        });
        let source = serde_json::json!({
            "observer": {"lifecycleQuietMs": 2000}
        });
        let merged = deep_merge(target, source);
        assert_eq!(merged["observer"]["lifecycleQuietMs"], 2000);
        assert_eq!(merged["observer"]["resolveFavicon"], true);
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4, 5]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["items"], serde_json::json!([4, 5]));
    }

    // ── load_settings_with ──────────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_settings_with(Path::new("/nonexistent/settings.json"), no_env).unwrap();
        assert_eq!(settings.observer.settle_mode, SettleMode::Corroborated);
        assert_eq!(settings.manifest.manifest_path, "manifest.json");
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"observer": {"settleMode": "lifecycle"}, "manifest": {"staleAfterSecs": 60}}"#,
        )
        .unwrap();

        let settings = load_settings_with(&path, no_env).unwrap();
        assert_eq!(settings.observer.settle_mode, SettleMode::Lifecycle);
        assert_eq!(settings.manifest.stale_after_secs, 60);
        assert_eq!(settings.manifest.input_path, "input.json");
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_settings_with(&path, no_env);
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn load_rejects_deadline_below_quiet_period() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"observer": {"corroboratedQuietMs": 5000, "sessionDeadlineMs": 4000}}"#,
        )
        .unwrap();

        let result = load_settings_with(&path, no_env);
        assert!(matches!(result.unwrap_err(), SettingsError::InvalidValue(_)));
    }

    // ── overrides ───────────────────────────────────────────────────

    #[test]
    fn env_overrides_take_priority() {
        let mut settings = NetricsSettings::default();
        apply_overrides(
            &mut settings,
            env_of(&[
                ("NETRICS_SETTLE_MODE", "Lifecycle"),
                ("NETRICS_LIFECYCLE_QUIET_MS", "750"),
                ("NETRICS_RESOLVE_FAVICON", "off"),
                ("CHROME_PATH", "/usr/bin/chromium"),
                ("NETRICS_MANIFEST_PATH", "/tmp/m.json"),
                ("NETRICS_STALE_AFTER_SECS", "0"),
            ]),
        );
        assert_eq!(settings.observer.settle_mode, SettleMode::Lifecycle);
        assert_eq!(settings.observer.lifecycle_quiet_ms, 750);
        assert!(!settings.observer.resolve_favicon);
        assert_eq!(settings.browser.chrome_path.as_deref(), Some("/usr/bin/chromium"));
        assert_eq!(settings.manifest.manifest_path, "/tmp/m.json");
        assert_eq!(settings.manifest.stale_after_secs, 0);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut settings = NetricsSettings::default();
        apply_overrides(
            &mut settings,
            env_of(&[
                ("NETRICS_SETTLE_MODE", "eventually"),
                ("NETRICS_SESSION_DEADLINE_MS", "5"),
                ("NETRICS_RESOLVE_FAVICON", "maybe"),
                ("NETRICS_LOG_LEVEL", ""),
            ]),
        );
        let defaults = NetricsSettings::default();
        assert_eq!(settings.observer.settle_mode, defaults.observer.settle_mode);
        assert_eq!(
            settings.observer.session_deadline_ms,
            defaults.observer.session_deadline_ms
        );
        assert!(settings.observer.resolve_favicon);
        assert_eq!(settings.logging.level, "info");
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for val in &["true", "1", "yes", "ON"] {
            assert_eq!(parse_bool(val), Some(true), "failed for {val}");
        }
        for val in &["false", "0", "no", "OFF"] {
            assert_eq!(parse_bool(val), Some(false), "failed for {val}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_u64_bounds() {
        assert_eq!(parse_u64_range("30000", 1000, 600_000), Some(30_000));
        assert_eq!(parse_u64_range("500", 1000, 600_000), None);
        assert_eq!(parse_u64_range("700000", 1000, 600_000), None);
        assert_eq!(parse_u64_range("abc", 1000, 600_000), None);
    }
}
