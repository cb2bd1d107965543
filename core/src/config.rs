//! Process-wide configuration. Built once at startup and read-only afterwards.

use crate::llm::LLMConfig;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub host: String,

    pub port: u16,

    /// Upper bound, in seconds, on each outbound call (GitHub fetch and model completion).
    pub request_timeout_secs: u64,

    pub llm: LLMConfig,

    pub github: GithubConfig,

    #[serde(flatten)]
    pub unknown: HashMap<String, Value>,
}

/// Where GitHub blob URLs are redirected to for raw file contents.
#[derive(Debug, Deserialize)]
pub struct GithubConfig {
    /// Host substituted for `github.com`. Example: "raw.githubusercontent.com"
    pub raw_host: String,

    #[serde(flatten)]
    pub unknown: HashMap<String, Value>,
}

impl Config {
    /// Warns about every config key nothing reads.
    pub fn validate(&self) {
        unknown_field_warning("", &self.unknown);
        unknown_field_warning("llm", &self.llm.unknown);
        unknown_field_warning("github", &self.github.unknown);
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Returns a mock config for testing.
    pub fn mock() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
            request_timeout_secs: 30,
            llm: LLMConfig {
                address: None,
                api_key: None,
                backend: "google".into(),
                model: Some("mock_model".into()),
                max_tokens: 1000,
                unknown: HashMap::new(),
            },
            github: GithubConfig {
                raw_host: "raw.githubusercontent.com".into(),
                unknown: HashMap::new(),
            },
            unknown: HashMap::new(),
        }
    }
}

/// Logs a warning for every field in `unknown`.
///
/// `prefix` should be the path to this entry (e.g. the `[llm]` table passes `llm`).
pub fn unknown_field_warning(prefix: &str, unknown: &HashMap<String, Value>) {
    let mut entries: Vec<_> = unknown.keys().collect();
    entries.sort_unstable();
    entries.into_iter().for_each(|name| match prefix {
        "" => warn!("unknown config key {name}"),
        p => warn!("unknown config key {p}.{name}"),
    });
}
