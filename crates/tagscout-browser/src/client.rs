//! HTTP client for the remote browser-automation service.
//!
//! Each browsing context lives on the service under a session id; this
//! client issues the per-session calls and maps HTTP failures onto
//! [`BrowserError`].

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tagscout_crawler::InterceptedResponse;

use crate::error::BrowserError;

#[derive(Serialize)]
struct LaunchRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LaunchResponse {
    session_id: String,
}

#[derive(Serialize)]
struct NavigateRequest<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    query: &'a str,
}

/// Client for the automation service's session API.
///
/// Use [`BrowserClient::new`] with the configured service URL; tests point it
/// at a wiremock server the same way.
#[derive(Clone)]
pub struct BrowserClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
    timeout: Duration,
}

impl std::fmt::Debug for BrowserClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserClient")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl BrowserClient {
    /// # Errors
    ///
    /// Returns [`BrowserError::Http`] if the `reqwest::Client` cannot be
    /// built, or [`BrowserError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn new(
        base_url: &str,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, BrowserError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("tagscout/0.1 (creator-discovery)")
            .build()?;

        // Normalise to exactly one trailing slash.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let parsed = Url::parse(&normalised).map_err(|e| BrowserError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(BrowserError::InvalidBaseUrl {
                url: base_url.to_owned(),
                reason: "URL cannot carry a path".to_owned(),
            });
        }

        Ok(Self {
            client,
            base_url: parsed,
            token: token.map(str::to_owned),
            timeout,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Open a session on the service. Anonymous sessions send empty
    /// credentials.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError`] on transport failure, a non-2xx status, or an
    /// unparseable body.
    pub async fn create_session(
        &self,
        username: &str,
        password: &str,
    ) -> Result<String, BrowserError> {
        let url = self.endpoint(&["sessions"])?;
        let request = self
            .client
            .post(url.clone())
            .json(&LaunchRequest { username, password });
        let body: LaunchResponse = self.send_json(request, &url, "create session").await?;
        Ok(body.session_id)
    }

    /// # Errors
    ///
    /// Returns [`BrowserError`] on transport failure or a non-2xx status.
    pub async fn navigate(&self, session_id: &str, target: &str) -> Result<(), BrowserError> {
        let url = self.endpoint(&["sessions", session_id, "navigate"])?;
        let request = self
            .client
            .post(url.clone())
            .json(&NavigateRequest { url: target });
        self.send(request, &url).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`BrowserError`] on transport failure, a non-2xx status, or a
    /// body that is not JSON.
    pub async fn extract(&self, session_id: &str, query: &str) -> Result<Value, BrowserError> {
        let url = self.endpoint(&["sessions", session_id, "extract"])?;
        let request = self
            .client
            .post(url.clone())
            .json(&ExtractRequest { query });
        self.send_json(request, &url, &format!("extract {query}"))
            .await
    }

    /// # Errors
    ///
    /// Returns [`BrowserError`] on transport failure, a non-2xx status, or a
    /// body that is not a response list.
    pub async fn responses(
        &self,
        session_id: &str,
    ) -> Result<Vec<InterceptedResponse>, BrowserError> {
        let url = self.endpoint(&["sessions", session_id, "responses"])?;
        let request = self.client.get(url.clone());
        self.send_json(request, &url, "intercepted responses").await
    }

    /// Delete the session. A session the service no longer knows about is
    /// already closed.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError`] on transport failure or a non-2xx status other
    /// than 404.
    pub async fn close_session(&self, session_id: &str) -> Result<(), BrowserError> {
        let url = self.endpoint(&["sessions", session_id])?;
        match self.send(self.client.delete(url.clone()), &url).await {
            Ok(_) | Err(BrowserError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, BrowserError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| BrowserError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: "URL cannot carry a path".to_owned(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder, url: &Url) -> Result<Response, BrowserError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await.map_err(|e| self.transport(e, url))?;
        check_status(response, url)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &Url,
        context: &str,
    ) -> Result<T, BrowserError> {
        let response = self.send(request, url).await?;
        let bytes = response.bytes().await.map_err(|e| self.transport(e, url))?;
        serde_json::from_slice(&bytes).map_err(|source| BrowserError::Deserialize {
            context: context.to_owned(),
            source,
        })
    }

    fn transport(&self, err: reqwest::Error, url: &Url) -> BrowserError {
        if err.is_timeout() {
            BrowserError::Timeout {
                url: url.to_string(),
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            BrowserError::Http(err)
        }
    }
}

fn check_status(response: Response, url: &Url) -> Result<Response, BrowserError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = url.to_string();
    tracing::debug!(status = status.as_u16(), %url, "automation service returned an error");
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BrowserError::Unauthorized {
            status: status.as_u16(),
            url,
        },
        StatusCode::NOT_FOUND => BrowserError::NotFound { url },
        StatusCode::TOO_MANY_REQUESTS => BrowserError::RateLimited {
            retry_after: retry_after_delay(response.headers()),
        },
        s if s.is_server_error() => BrowserError::Server {
            status: s.as_u16(),
            url,
        },
        s => BrowserError::UnexpectedStatus {
            status: s.as_u16(),
            url,
        },
    })
}

/// Delay requested by a `Retry-After` header given in seconds.
fn retry_after_delay(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
