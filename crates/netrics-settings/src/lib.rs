//! # netrics-settings
//!
//! Layered configuration for the netrics page-load observer.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`NetricsSettings::default()`]
//! 2. **User file**: `~/.netrics/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `NETRICS_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_overrides, deep_merge, load_settings, load_settings_from_path, load_settings_with,
    settings_path,
};
pub use types::*;
