//! This module wraps the `llm` crate behind a small async interface.
//!
//! Exactly one [Provider] is chosen from configuration when the process starts. The relay talks
//! to it through [CompletionClient], which applies the request timeout and strips the markdown
//! fences models like to wrap code in.

use async_trait::async_trait;
use llm::LLMProvider;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;
use llm::error::LLMError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

/// API Key wrapper that hides the key in debug output.
#[derive(Clone, Deserialize)]
pub struct ApiKey(pub String);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("********")
    }
}

/// The text-generation services the relay can be deployed against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    Google,
    Groq,
    OpenAI,
}

impl Provider {
    /// Human-readable engine name, shown in the connection log entry.
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::Google => "Google Gemini",
            Provider::Groq => "Groq LPU",
            Provider::OpenAI => "OpenAI",
        }
    }

    /// Vendor name used when reporting provider failures.
    pub fn vendor(self) -> &'static str {
        match self {
            Provider::Google => "Google",
            Provider::Groq => "Groq",
            Provider::OpenAI => "OpenAI",
        }
    }

    /// Environment variable consulted for the credential when the config file has none.
    pub fn api_key_var(self) -> &'static str {
        match self {
            Provider::Google => "GEMINI_API_KEY",
            Provider::Groq => "GROQ_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Provider::Google => "gemini-1.5-flash",
            Provider::Groq => "llama-3.1-8b-instant",
            Provider::OpenAI => "gpt-3.5-turbo",
        }
    }

    /// Gemini takes the whole instruction as one user turn; the chat-completion APIs get a
    /// system instruction plus a user turn.
    pub fn prompt_style(self) -> PromptStyle {
        match self {
            Provider::Google => PromptStyle::Combined,
            Provider::Groq | Provider::OpenAI => PromptStyle::Chat,
        }
    }

    fn backend(self) -> LLMBackend {
        match self {
            Provider::Google => LLMBackend::Google,
            Provider::Groq => LLMBackend::Groq,
            Provider::OpenAI => LLMBackend::OpenAI,
        }
    }
}

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" | "gemini" => Ok(Provider::Google),
            "groq" => Ok(Provider::Groq),
            "openai" => Ok(Provider::OpenAI),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown LLM backend {0:?}; expected one of google, groq, openai")]
pub struct UnknownProvider(pub String);

/// Configuration for the LLM client.
#[derive(Debug, Deserialize)]
pub struct LLMConfig {
    /// Base URL override for the provider's API. Example: "http://[::1]:8080/v1"
    pub address: Option<String>,

    /// API Key for the LLM service. Falls back to the provider's environment variable.
    pub api_key: Option<ApiKey>,

    /// Which backend to use, e.g. "google".
    pub backend: String,

    /// Name of the model to invoke. Defaults to the provider's stock model.
    pub model: Option<String>,

    /// Maximum output tokens.
    pub max_tokens: u32,

    #[serde(flatten)]
    pub unknown: HashMap<String, Value>,
}

impl LLMConfig {
    pub fn provider(&self) -> Result<Provider, UnknownProvider> {
        self.backend.parse()
    }

    pub fn model_for(&self, provider: Provider) -> &str {
        match self.model.as_deref() {
            Some(model) if !model.is_empty() => model,
            _ => provider.default_model(),
        }
    }

    /// Returns the configured credential, reading the provider's environment variable if the
    /// config does not carry one. Empty keys count as missing.
    pub fn credential(&self, provider: Provider) -> Option<ApiKey> {
        if let Some(ref api_key) = self.api_key
            && !api_key.0.is_empty()
        {
            return Some(api_key.clone());
        }
        std::env::var(provider.api_key_var())
            .ok()
            .filter(|key| !key.is_empty())
            .map(ApiKey)
    }
}

/// How a provider wants its instructions laid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptStyle {
    Combined,
    Chat,
}

/// A request ready to be sent to the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Prompt {
    /// The whole instruction, code, and error in a single user turn.
    Combined(String),
    /// The user turn of a chat exchange. The system instruction is installed on the client
    /// when it is built.
    Chat(String),
}

impl Prompt {
    pub fn text(&self) -> &str {
        match self {
            Prompt::Combined(text) | Prompt::Chat(text) => text,
        }
    }
}

/// A failed completion call. `raw_message` is whatever the provider (or its SDK) reported.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{raw_message}")]
pub struct ProviderError {
    pub raw_message: String,
}

impl ProviderError {
    pub fn new(raw_message: impl Into<String>) -> Self {
        Self {
            raw_message: raw_message.into(),
        }
    }
}

impl From<LLMError> for ProviderError {
    fn from(error: LLMError) -> Self {
        Self::new(error.to_string())
    }
}

/// Something that can turn a [Prompt] into model output.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Sends `prompt` as a single non-streaming request and returns the model's raw text.
    async fn complete(&self, prompt: &Prompt) -> Result<String, ProviderError>;
}

/// [CompletionProvider] backed by a client from the `llm` crate.
pub struct LlmProvider {
    client: Box<dyn LLMProvider>,
}

impl LlmProvider {
    /// Builds an LLM client from configuration. `system_prompt` is only set for chat-style
    /// providers.
    pub fn build(
        config: &LLMConfig,
        provider: Provider,
        api_key: &ApiKey,
        system_prompt: Option<&str>,
    ) -> Result<Self, LLMError> {
        let mut llm_builder = LLMBuilder::new()
            .backend(provider.backend())
            .model(config.model_for(provider))
            .max_tokens(config.max_tokens)
            .temperature(0.0)
            .api_key(&api_key.0);

        if let Some(system) = system_prompt {
            llm_builder = llm_builder.system(system);
        }
        if let Some(ref address) = config.address
            && !address.is_empty()
        {
            llm_builder = llm_builder.base_url(address);
        }

        Ok(Self {
            client: llm_builder.build()?,
        })
    }
}

#[async_trait]
impl CompletionProvider for LlmProvider {
    async fn complete(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        let messages = [ChatMessage::user().content(prompt.text()).build()];
        self.client
            .chat(&messages)
            .await?
            .text()
            .ok_or_else(|| ProviderError::new("provider returned no text"))
    }
}

/// The one completion client a process owns.
pub struct CompletionClient {
    provider: Box<dyn CompletionProvider>,
    timeout: Duration,
}

impl CompletionClient {
    pub fn new(provider: Box<dyn CompletionProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Invokes the model and cleans up the response.
    ///
    /// A call that outlives the timeout is reported as a [ProviderError] like any other failure.
    pub async fn complete(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        debug!("Sending prompt to model ({} bytes)", prompt.text().len());
        let response = tokio::time::timeout(self.timeout, self.provider.complete(prompt))
            .await
            .map_err(|_| {
                ProviderError::new(format!("request timed out after {:?}", self.timeout))
            })??;
        trace!("Model responded: {response:?}");

        let code = strip_code_fences(&response);
        if code.trim().is_empty() {
            return Err(ProviderError::new("model returned an empty response"));
        }
        Ok(code.to_string())
    }
}

/// Strips markdown code fences from `text`, keeping only the fenced code.
///
/// Everything from the first fence to the last one is kept, minus the opening fence line (which
/// carries any language tag). Prose the model writes around the block is dropped. A lone fence
/// is treated as an opener unless only whitespace follows it. Text without fences is returned
/// untouched.
pub fn strip_code_fences(text: &str) -> &str {
    const FENCE: &str = "```";
    let Some(open) = text.find(FENCE) else {
        return text;
    };
    let after_open = &text[open + FENCE.len()..];

    let body = match after_open.rfind(FENCE) {
        Some(close) => &after_open[..close],
        None if after_open.trim().is_empty() => return &text[..open],
        None => after_open,
    };
    match body.split_once('\n') {
        Some((_tag, code)) => code,
        None => body,
    }
}
