//! HTTP client shared by the hub adapters.
//!
//! Wraps reqwest with:
//! - Bearer-token authentication
//! - Rate limit tracking from response headers, with throttling
//! - Status checking that maps failures to [`PtmError::Network`]
//! - `Link: <…>; rel="next"` pagination

use crate::config::NetworkConfig;
use crate::{PtmError, Result};
use regex::Regex;
use reqwest::header::{HeaderMap, AUTHORIZATION, LINK};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

static NEXT_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<([^>]+)>\s*;\s*rel="?next"?"#).expect("valid regex"));

/// Rate limit state extracted from response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitState {
    pub remaining: Option<u64>,
    pub limit: Option<u64>,
}

impl RateLimitState {
    /// Throttle once fewer than 10% of the window's requests are left.
    pub fn should_throttle(&self) -> bool {
        match (self.remaining, self.limit) {
            (Some(remaining), Some(limit)) if limit > 0 => remaining < (limit / 10).max(1),
            _ => false,
        }
    }
}

/// Extract the `rel="next"` target of a `Link` header.
pub fn next_link(link_header: &str) -> Option<String> {
    NEXT_LINK
        .captures(link_header)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// HTTP client with optional bearer authentication.
pub struct HttpClient {
    client: Client,
    token: Option<String>,
    rate_limit_remaining: AtomicI64,
    rate_limit_limit: AtomicU64,
    throttle_delay: Duration,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("has_token", &self.token.is_some())
            .field("rate_limit", &self.rate_limit_state())
            .finish()
    }
}

impl HttpClient {
    pub fn new(token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(NetworkConfig::REQUEST_TIMEOUT)
            .connect_timeout(NetworkConfig::CONNECT_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| PtmError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                status_code: None,
            })?;

        Ok(Self {
            client,
            token: token.filter(|t| !t.trim().is_empty()),
            rate_limit_remaining: AtomicI64::new(-1),
            rate_limit_limit: AtomicU64::new(0),
            throttle_delay: Duration::from_millis(500),
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn rate_limit_state(&self) -> RateLimitState {
        let remaining = self.rate_limit_remaining.load(Ordering::SeqCst);
        let limit = self.rate_limit_limit.load(Ordering::SeqCst);
        RateLimitState {
            remaining: (remaining >= 0).then_some(remaining as u64),
            limit: (limit > 0).then_some(limit),
        }
    }

    /// GET a URL and return the checked response.
    pub async fn get(&self, url: &str) -> Result<Response> {
        self.send(self.client.get(url), "GET", url).await
    }

    /// GET a URL and decode its JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.get(url).await?;
        Self::decode(response, url).await
    }

    /// GET a paginated JSON array, following `Link` headers.
    ///
    /// Stops after `limit` items when a limit is given.
    pub async fn get_paged(&self, url: &str, limit: Option<usize>) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut next = Some(url.to_string());

        while let Some(page_url) = next.take() {
            let response = self.get(&page_url).await?;
            next = Self::next_page(response.headers());
            let page: Vec<Value> = Self::decode(response, &page_url).await?;
            debug!("Fetched page of {} items from {}", page.len(), page_url);

            if page.is_empty() {
                break;
            }
            items.extend(page);

            if let Some(limit) = limit {
                if items.len() >= limit {
                    items.truncate(limit);
                    break;
                }
            }
        }

        Ok(items)
    }

    /// POST a JSON body and decode the JSON answer.
    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(self.client.post(url).json(body), "POST", url).await?;
        Self::decode(response, url).await
    }

    async fn send(&self, request: RequestBuilder, method: &str, url: &str) -> Result<Response> {
        self.maybe_throttle().await;

        let request = match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        };

        let response = request.send().await.map_err(|e| PtmError::Network {
            message: format!("{} {} failed: {}", method, url, e),
            status_code: None,
        })?;

        self.update_rate_limits(response.headers());

        let status = response.status();
        if !status.is_success() {
            return Err(PtmError::Network {
                message: format!("{} {} returned {}", method, url, status),
                status_code: Some(status.as_u16()),
            });
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response, url: &str) -> Result<T> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| PtmError::Json {
            message: format!("Failed to parse response from {}: {}", url, e),
            source: Some(e),
        })
    }

    fn next_page(headers: &HeaderMap) -> Option<String> {
        headers
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(next_link)
    }

    async fn maybe_throttle(&self) {
        let state = self.rate_limit_state();
        if state.should_throttle() {
            warn!(
                "Rate limit approaching (remaining: {:?}/{:?}), throttling for {:?}",
                state.remaining, state.limit, self.throttle_delay
            );
            tokio::time::sleep(self.throttle_delay).await;
        }
    }

    fn update_rate_limits(&self, headers: &HeaderMap) {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

        if let Some(num) = header("X-RateLimit-Remaining").and_then(|v| v.parse::<i64>().ok()) {
            self.rate_limit_remaining.store(num, Ordering::SeqCst);
        }
        if let Some(num) = header("X-RateLimit-Limit").and_then(|v| v.parse::<u64>().ok()) {
            self.rate_limit_limit.store(num, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_throttle() {
        let state = RateLimitState {
            remaining: Some(5),
            limit: Some(100),
        };
        assert!(state.should_throttle());

        let state = RateLimitState {
            remaining: Some(50),
            limit: Some(100),
        };
        assert!(!state.should_throttle());

        assert!(!RateLimitState::default().should_throttle());
    }

    #[test]
    fn test_next_link() {
        let header = r#"<https://huggingface.co/api/models?cursor=abc&limit=1000>; rel="next""#;
        assert_eq!(
            next_link(header).as_deref(),
            Some("https://huggingface.co/api/models?cursor=abc&limit=1000")
        );
        assert_eq!(next_link(r#"<https://x.test/1>; rel="prev""#), None);
    }

    #[test]
    fn test_blank_token_is_ignored() {
        let client = HttpClient::new(Some("  ".to_string())).unwrap();
        assert!(!client.has_token());
        assert_eq!(client.rate_limit_state(), RateLimitState::default());
    }
}
