//! Turns a GitHub file link into the file's source.
//!
//! `https://github.com/<owner>/<repo>/blob/<ref>/<path>` is rewritten to the raw-content host and
//! fetched. Anything else, and any fetch that does not come back `200 OK`, resolves to the input
//! unchanged. Resolution never fails.

use codefix_core::config::Config;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Returns true if `input` mentions GitHub at all, i.e. whether resolution is worth attempting.
pub fn is_github_reference(input: &str) -> bool {
    input.contains("github.com")
}

/// Rewrites a GitHub blob URL to its raw-content URL on `raw_host`. Returns `None` for inputs
/// that are not blob URLs.
pub fn raw_url(input: &str, raw_host: &str) -> Option<String> {
    if !(is_github_reference(input) && input.contains("blob")) {
        return None;
    }
    Some(input.replace("github.com", raw_host).replace("/blob/", "/"))
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),
}

pub struct SourceResolver {
    client: reqwest::Client,
    raw_host: String,
}

impl SourceResolver {
    pub fn new(raw_host: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            raw_host: raw_host.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Self::new(&config.github.raw_host, config.request_timeout())
    }

    /// Returns the source behind `input` if it is a fetchable GitHub blob URL, otherwise `input`
    /// itself.
    pub async fn resolve(&self, input: &str) -> String {
        let Some(url) = raw_url(input, &self.raw_host) else {
            return input.to_string();
        };
        match self.fetch(&url).await {
            Ok(source) => {
                debug!("Fetched {} bytes from {url}", source.len());
                source
            }
            Err(e) => {
                debug!("Falling back to the original input, fetching {url} failed: {e}");
                input.to_string()
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;
        if response.status() != StatusCode::OK {
            return Err(FetchError::Status(response.status()));
        }
        Ok(response.text().await?)
    }
}
