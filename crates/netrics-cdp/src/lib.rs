//! # netrics-cdp
//!
//! Chrome `DevTools` Protocol transport for the netrics observer.
//!
//! - [`find_chrome`]: locate a Chrome or Chromium binary
//! - [`CdpSession`]: one headless browser with its own profile, speaking
//!   CDP over a WebSocket
//! - [`ChromeLauncher`]: a [`SessionSource`](netrics_observer::SessionSource)
//!   that launches a fresh browser per observation

#![deny(unsafe_code)]

pub mod chrome;
pub mod error;
pub mod events;
pub mod launcher;
pub mod session;

pub use chrome::{find_chrome, find_chrome_with};
pub use error::BrowserError;
pub use events::decode_event;
pub use launcher::ChromeLauncher;
pub use session::{CdpSession, LaunchOptions};
