//! Capability traits for the browser-automation engine.
//!
//! The crawler never touches engine internals. It navigates, asks for
//! named extractions, and drains the network responses the engine
//! intercepted since the previous drain.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tagscout_core::Account;

use crate::error::CrawlError;

/// Extraction returning `{"logged_in": bool, "challenge": bool}`.
pub const LOGIN_STATE_QUERY: &str = "login_state";

/// Extraction returning the hydrated user-detail state of a profile page.
pub const PROFILE_STATE_QUERY: &str = "profile_state";

/// Extraction that scrolls the current page by one viewport.
pub const SCROLL_QUERY: &str = "scroll:page";

/// One network response captured by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterceptedResponse {
    pub url: String,
    pub status: u16,
    #[serde(default)]
    pub body: Value,
}

impl InterceptedResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// An open, possibly authenticated, browsing context.
#[async_trait]
pub trait BrowsingEngine: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), CrawlError>;

    async fn extract(&self, query: &str) -> Result<Value, CrawlError>;

    /// Drain the responses captured since the previous call.
    async fn intercepted_responses(&self) -> Result<Vec<InterceptedResponse>, CrawlError>;

    async fn close(&self) -> Result<(), CrawlError>;
}

/// Opens new browsing contexts, logged in as `account` when one is given.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self, account: Option<&Account>)
        -> Result<Box<dyn BrowsingEngine>, CrawlError>;
}
