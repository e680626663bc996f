//! Full rebuild and incremental refresh.
//!
//! The two entry points treat failures differently: a rebuild skips sites
//! that fail and keeps the rest, while a refresh stops at the first failure
//! so the operator sees it. Entries refreshed before the failure are already
//! on disk.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use netrics_observer::{Summarize, Website};
use tracing::{debug, info, warn};

use crate::errors::{ManifestError, Result};
use crate::storage::ManifestStorage;
use crate::types::{Input, Manifest};

/// Default age after which an entry is refreshed.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(60 * 60);

/// What an incremental refresh did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Titles that were re-summarized and saved, in processing order.
    pub refreshed: Vec<String>,
    /// Titles left alone because they were recent enough.
    pub fresh: Vec<String>,
}

/// Summarize every configured site into a new manifest.
///
/// A site that fails is logged and left out.
pub async fn build_manifest(input: &Input, summarizer: &dyn Summarize) -> Manifest {
    let mut manifest = Manifest::default();
    for site in &input.websites {
        match summarizer.summarize(&site.url).await {
            Ok(website) => {
                info!(title = %site.title, resources = website.resources.len(), "site added");
                let _ = manifest.websites.insert(site.title.clone(), website);
            }
            Err(e) => {
                warn!(
                    title = %site.title,
                    url = %site.url,
                    deadline = e.is_deadline(),
                    error = %e,
                    "skipping site"
                );
            }
        }
    }
    info!(
        sites = input.websites.len(),
        summarized = manifest.len(),
        "manifest rebuilt"
    );
    manifest
}

/// Re-summarize every entry older than `stale_after`, saving after each one.
///
/// Entries are visited in ascending title order. The first failure aborts
/// the run.
pub async fn update_manifest(
    storage: &dyn ManifestStorage,
    summarizer: &dyn Summarize,
    now: DateTime<Utc>,
    stale_after: Duration,
) -> Result<RefreshReport> {
    let mut manifest = storage.load()?;
    let threshold = TimeDelta::from_std(stale_after).unwrap_or(TimeDelta::MAX);
    let titles: Vec<String> = manifest.websites.keys().cloned().collect();
    let mut report = RefreshReport::default();

    for title in titles {
        let Some(entry) = manifest.websites.get(&title) else {
            continue;
        };
        if !is_stale(entry, now, threshold) {
            debug!(title = %title, updated = %entry.updated, "entry is fresh");
            report.fresh.push(title);
            continue;
        }

        let url = entry.url.clone();
        info!(title = %title, url = %url, "refreshing entry");
        let website = summarizer
            .summarize(&url)
            .await
            .map_err(|source| ManifestError::Summarize {
                title: title.clone(),
                source,
            })?;
        let _ = manifest.websites.insert(title.clone(), website);
        storage.save(&manifest)?;
        report.refreshed.push(title);
    }

    info!(
        refreshed = report.refreshed.len(),
        fresh = report.fresh.len(),
        "manifest refresh complete"
    );
    Ok(report)
}

/// Whether `site` is at least `threshold` old. A missing or malformed
/// timestamp counts as stale.
fn is_stale(site: &Website, now: DateTime<Utc>, threshold: TimeDelta) -> bool {
    site.updated_at()
        .is_none_or(|updated| now.signed_duration_since(updated) >= threshold)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
