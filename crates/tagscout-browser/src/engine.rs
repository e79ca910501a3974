use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tagscout_core::Account;
use tagscout_crawler::{BrowsingEngine, CrawlError, InterceptedResponse, SessionLauncher};

use crate::client::BrowserClient;

/// Launches browsing contexts on the automation service.
#[derive(Debug, Clone)]
pub struct RemoteLauncher {
    client: Arc<BrowserClient>,
}

impl RemoteLauncher {
    #[must_use]
    pub fn new(client: BrowserClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

#[async_trait]
impl SessionLauncher for RemoteLauncher {
    async fn launch(
        &self,
        account: Option<&Account>,
    ) -> Result<Box<dyn BrowsingEngine>, CrawlError> {
        let (username, password) = account.map_or(("", ""), |a| {
            (a.username.as_str(), a.password.as_str())
        });
        let session_id = self.client.create_session(username, password).await?;
        tracing::info!(
            %session_id,
            account = account.map(|a| a.username.as_str()),
            "remote session opened"
        );
        Ok(Box::new(RemoteSession {
            client: Arc::clone(&self.client),
            session_id,
        }))
    }
}

/// One session on the automation service.
#[derive(Debug)]
pub struct RemoteSession {
    client: Arc<BrowserClient>,
    session_id: String,
}

#[async_trait]
impl BrowsingEngine for RemoteSession {
    async fn navigate(&self, url: &str) -> Result<(), CrawlError> {
        Ok(self.client.navigate(&self.session_id, url).await?)
    }

    async fn extract(&self, query: &str) -> Result<Value, CrawlError> {
        Ok(self.client.extract(&self.session_id, query).await?)
    }

    async fn intercepted_responses(&self) -> Result<Vec<InterceptedResponse>, CrawlError> {
        Ok(self.client.responses(&self.session_id).await?)
    }

    async fn close(&self) -> Result<(), CrawlError> {
        self.client.close_session(&self.session_id).await?;
        tracing::debug!(session_id = %self.session_id, "remote session closed");
        Ok(())
    }
}
