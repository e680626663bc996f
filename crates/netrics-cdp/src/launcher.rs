//! Session source that launches one headless Chrome per observation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use netrics_observer::{ObserveError, PageSession, SessionSource};
use tracing::debug;

use crate::chrome::{find_chrome, find_chrome_with};
use crate::error::BrowserError;
use crate::session::{CdpSession, LaunchOptions};

/// Launches a fresh browser, with a throwaway profile, for every session.
#[derive(Clone, Debug)]
pub struct ChromeLauncher {
    chrome_path: PathBuf,
    options: LaunchOptions,
}

impl ChromeLauncher {
    /// Use a known Chrome binary.
    pub fn new(chrome_path: impl Into<PathBuf>, options: LaunchOptions) -> Self {
        Self {
            chrome_path: chrome_path.into(),
            options,
        }
    }

    /// Locate Chrome, preferring `explicit`, then `CHROME_PATH`, then the
    /// well-known install locations.
    pub fn discover(explicit: Option<&str>, options: LaunchOptions) -> Result<Self, BrowserError> {
        let chrome_path = find_chrome_with(explicit)
            .or_else(find_chrome)
            .ok_or(BrowserError::ChromeNotFound)?;
        debug!(path = %chrome_path.display(), "using Chrome binary");
        Ok(Self::new(chrome_path, options))
    }

    /// Path of the browser binary.
    pub fn chrome_path(&self) -> &Path {
        &self.chrome_path
    }

    /// Options applied to every launch.
    pub fn options(&self) -> &LaunchOptions {
        &self.options
    }
}

#[async_trait]
impl SessionSource for ChromeLauncher {
    async fn open(&self) -> Result<Box<dyn PageSession>, ObserveError> {
        let session = CdpSession::launch(&self.chrome_path, &self.options).await?;
        Ok(Box::new(session))
    }
}
