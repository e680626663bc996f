//! # netrics-manifest
//!
//! The persisted title → [`Website`](netrics_observer::Website) mapping.
//!
//! - [`build_manifest`]: summarize every configured site from scratch,
//!   skipping failures
//! - [`update_manifest`]: refresh stale entries one at a time, saving after
//!   each, stopping at the first failure
//! - [`FileStorage`]: JSON file with atomic replace

#![deny(unsafe_code)]

pub mod errors;
pub mod storage;
pub mod store;
pub mod types;

pub use errors::{ManifestError, Result};
pub use storage::{FileStorage, ManifestStorage, load_input, to_pretty_json};
pub use store::{DEFAULT_STALE_AFTER, RefreshReport, build_manifest, update_manifest};
pub use types::{Input, Manifest, SiteConfig};
