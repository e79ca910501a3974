//! Remote browser-automation adapter.
//!
//! Implements the crawler's [`tagscout_crawler::SessionLauncher`] and
//! [`tagscout_crawler::BrowsingEngine`] capabilities over the automation
//! service's HTTP session API.

pub mod client;
pub mod engine;
pub mod error;

pub use client::BrowserClient;
pub use engine::{RemoteLauncher, RemoteSession};
pub use error::BrowserError;
