//! HTTP transport used by the streams.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

/// One-request-at-a-time JSON transport.
///
/// Streams only ever talk to the upstream through this trait, which keeps
/// the pagination logic testable against scripted responses. No retries
/// happen here or above it.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// POST a JSON body and decode the JSON response.
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value>;

    /// GET with query parameters and decode the JSON response.
    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value>;
}

/// Client settings for [`ReqwestTransport`].
#[derive(Debug, Clone)]
pub struct TransportOpts {
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for TransportOpts {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: None,
        }
    }
}

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(opts: &TransportOpts) -> Result<Self> {
        let user_agent = opts
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("decentraland-tap/{}", env!("CARGO_PKG_VERSION")));

        let client = reqwest::Client::builder()
            .timeout(opts.timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }

    async fn decode(response: reqwest::Response, url: &str) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP request failed with status {status} for URL: {url}");
        }

        response
            .json::<Value>()
            .await
            .with_context(|| format!("Failed to decode JSON response from: {url}"))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to POST to URL: {url}"))?;

        Self::decode(response, url).await
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to fetch URL: {url}"))?;

        Self::decode(response, url).await
    }
}
