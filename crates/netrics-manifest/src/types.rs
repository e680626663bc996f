//! Manifest and input file shapes.

use std::collections::BTreeMap;

use netrics_observer::Website;
use serde::{Deserialize, Serialize};

/// Persisted mapping from site title to its latest summary.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Entries keyed by title. Ordered so the file is stable across writes.
    #[serde(default)]
    pub websites: BTreeMap<String, Website>,
}

impl Manifest {
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.websites.len()
    }

    /// Whether the manifest has no entries.
    pub fn is_empty(&self) -> bool {
        self.websites.is_empty()
    }
}

/// One configured site.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Manifest key.
    pub title: String,
    /// URL to observe.
    pub url: String,
}

/// Input file for a full rebuild.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    /// Sites, in the order they are summarized.
    #[serde(default)]
    pub websites: Vec<SiteConfig>,
}
