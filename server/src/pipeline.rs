//! The request pipeline behind `POST /process-fix`.
//!
//! Every outcome, including a missing credential or a failed model call, ends in a
//! [FixResponse]. Failures show up as `error` log entries and a commented placeholder in
//! `fixed_code`.

use crate::types::{FixRequest, FixResponse, StepLog};
use codefix_core::config::Config;
use codefix_core::llm::{CompletionClient, LlmProvider, Provider, ProviderError, UnknownProvider};
use source_resolver::{SourceResolver, is_github_reference};
use thiserror::Error;
use tracing::{error, info, warn};

pub const FETCHING: &str = "🌐 Network: Fetching source from GitHub...";
pub const ANALYZING: &str = "⚡ AI Core: Analyzing Logic...";
pub const PATCH_APPLIED: &str = "✅ Optimization: Logic Patch Applied.";
pub const DEPLOYMENT_READY: &str = "SUCCESS: Deployment Ready.";

pub const MISSING_KEY_PLACEHOLDER: &str = "# Error: API Key missing in backend";
pub const QUOTA_PLACEHOLDER: &str = "# Error: Quota Exceeded. Use a different key or wait.";

/// How a failed completion is reported back to the caller.
#[derive(Debug, PartialEq, Eq)]
pub enum Failure {
    QuotaExceeded,
    Generic(String),
}

impl Failure {
    /// Any `429` in the provider's message counts as a rate-limit signal; SDK error text has no
    /// reliable structure to parse a status code out of.
    pub fn classify(error: &ProviderError) -> Failure {
        if error.raw_message.contains("429") {
            Failure::QuotaExceeded
        } else {
            Failure::Generic(error.raw_message.clone())
        }
    }
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    UnknownProvider(#[from] UnknownProvider),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("failed to build LLM client: {0}")]
    LlmClient(String),
}

pub struct FixPipeline {
    provider: Provider,
    model: String,
    resolver: SourceResolver,
    /// `None` when no credential was configured at startup.
    client: Option<CompletionClient>,
}

impl FixPipeline {
    pub fn new(
        provider: Provider,
        model: &str,
        resolver: SourceResolver,
        client: Option<CompletionClient>,
    ) -> Self {
        Self {
            provider,
            model: model.to_string(),
            resolver,
            client,
        }
    }

    /// Builds the pipeline for the configured provider. The credential is read here, once.
    pub fn from_config(config: &Config) -> Result<Self, SetupError> {
        let provider = config.llm.provider()?;
        let model = config.llm.model_for(provider);
        let resolver = SourceResolver::from_config(config)?;

        let client = match config.llm.credential(provider) {
            Some(api_key) => {
                let system_prompt = fix_prompt::system_prompt(provider.prompt_style());
                let llm = LlmProvider::build(&config.llm, provider, &api_key, system_prompt)
                    .map_err(|e| SetupError::LlmClient(e.to_string()))?;
                info!("{} client configured (model {model})", provider.display_name());
                Some(CompletionClient::new(Box::new(llm), config.request_timeout()))
            }
            None => {
                warn!(
                    "{} not set; every fix request will report a missing credential",
                    provider.api_key_var()
                );
                None
            }
        };

        Ok(Self::new(provider, model, resolver, client))
    }

    pub async fn run(&self, request: FixRequest) -> FixResponse {
        info!("Processing fix request ({} bytes of code)", request.code.len());
        let mut log = StepLog::default();
        log.info(format!(
            "🚀 System: Connected to {} ({}).",
            self.provider.display_name(),
            self.model
        ));

        let code = if is_github_reference(&request.code) {
            log.info(FETCHING);
            self.resolver.resolve(&request.code).await
        } else {
            request.code
        };

        let Some(client) = &self.client else {
            log.error(format!(
                "❌ Server Error: Missing {} in environment or .env file.",
                self.provider.api_key_var()
            ));
            return log.into_response(MISSING_KEY_PLACEHOLDER.to_string());
        };

        log.info(ANALYZING);
        let prompt = fix_prompt::build(&code, &request.error_log, self.provider.prompt_style());
        let fixed_code = match client.complete(&prompt).await {
            Ok(fixed_code) => {
                log.success(PATCH_APPLIED);
                log.success(DEPLOYMENT_READY);
                fixed_code
            }
            Err(e) => {
                error!("{} completion failed: {e}", self.provider.vendor());
                match Failure::classify(&e) {
                    Failure::QuotaExceeded => {
                        log.error(format!(
                            "⚠️ QUOTA EXCEEDED: {} has temporarily locked this key.",
                            self.provider.vendor()
                        ));
                        QUOTA_PLACEHOLDER.to_string()
                    }
                    Failure::Generic(message) => {
                        log.error(format!("❌ {} Error: {message}", self.provider.vendor()));
                        format!("# Error: {message}")
                    }
                }
            }
        };

        log.into_response(fixed_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LogEntry, LogKind, ResponseStatus};
    use codefix_core::llm::{ApiKey, Prompt};
    use codefix_core::test_util::MockProvider;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn resolver(raw_host: &str) -> SourceResolver {
        SourceResolver::new(raw_host, TIMEOUT).unwrap()
    }

    fn pipeline(provider: Provider, mock: Option<MockProvider>) -> FixPipeline {
        FixPipeline::new(
            provider,
            "test-model",
            resolver("raw.githubusercontent.com"),
            mock.map(|mock| CompletionClient::new(mock.boxed(), TIMEOUT)),
        )
    }

    fn request(code: &str, error_log: &str) -> FixRequest {
        FixRequest {
            code: code.into(),
            error_log: error_log.into(),
        }
    }

    fn kinds(logs: &[LogEntry]) -> Vec<LogKind> {
        logs.iter().map(|entry| entry.kind).collect()
    }

    #[tokio::test]
    async fn successful_fix() {
        let mock = MockProvider::new().respond("```python\nprint(x)\nx = 1\n```");
        let prompts = mock.prompts();
        let response = pipeline(Provider::Google, Some(mock))
            .run(request("print(x)", "NameError"))
            .await;

        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.fixed_code, "print(x)\nx = 1\n");
        assert_eq!(
            kinds(&response.logs),
            [LogKind::Info, LogKind::Info, LogKind::Success, LogKind::Success]
        );
        assert_eq!(
            response.logs[0].message,
            "🚀 System: Connected to Google Gemini (test-model)."
        );
        assert_eq!(response.logs[1].message, ANALYZING);
        assert_eq!(response.logs[2].message, PATCH_APPLIED);
        assert_eq!(response.logs[3].message, DEPLOYMENT_READY);

        let prompts = prompts.lock().unwrap();
        let [Prompt::Combined(text)] = prompts.as_slice() else {
            panic!("expected one combined prompt, got {prompts:?}");
        };
        assert!(text.contains("print(x)"));
        assert!(text.contains("NameError"));
    }

    #[tokio::test]
    async fn chat_providers_get_chat_prompts() {
        let mock = MockProvider::new().respond("fixed");
        let prompts = mock.prompts();
        pipeline(Provider::Groq, Some(mock))
            .run(request("broken", "oops"))
            .await;
        assert!(matches!(prompts.lock().unwrap().as_slice(), [Prompt::Chat(_)]));
    }

    #[tokio::test]
    async fn github_source_is_fetched_before_analysis() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/u/r/main/app.py"))
            .respond_with(ResponseTemplate::new(200).set_body_string("import sys\nsys.exit(1\n"))
            .mount(&server)
            .await;

        let mock = MockProvider::new().respond("import sys\nsys.exit(1)\n");
        let prompts = mock.prompts();
        let pipeline = FixPipeline::new(
            Provider::OpenAI,
            "test-model",
            resolver(&server.address().to_string()),
            Some(CompletionClient::new(mock.boxed(), TIMEOUT)),
        );
        let response = pipeline
            .run(request("http://github.com/u/r/blob/main/app.py", "SyntaxError"))
            .await;

        assert_eq!(response.logs[1].message, FETCHING);
        assert_eq!(response.logs[2].message, ANALYZING);
        assert_eq!(response.fixed_code, "import sys\nsys.exit(1)\n");
        assert!(prompts.lock().unwrap()[0].text().contains("sys.exit(1\n"));
    }

    #[tokio::test]
    async fn github_link_without_blob_is_announced_and_passed_through() {
        let mock = MockProvider::new().respond("fixed");
        let prompts = mock.prompts();
        let response = pipeline(Provider::Google, Some(mock))
            .run(request("see https://github.com/u/r", "err"))
            .await;

        assert_eq!(response.logs[1].message, FETCHING);
        assert!(
            prompts.lock().unwrap()[0]
                .text()
                .contains("see https://github.com/u/r")
        );
    }

    #[tokio::test]
    async fn missing_credential_short_circuits() {
        let response = pipeline(Provider::Google, None)
            .run(request("print(x)", "NameError"))
            .await;

        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(kinds(&response.logs), [LogKind::Info, LogKind::Error]);
        assert!(response.logs[1].message.contains("Missing GEMINI_API_KEY"));
        assert_eq!(response.fixed_code, MISSING_KEY_PLACEHOLDER);
    }

    #[tokio::test]
    async fn config_without_credential_builds_keyless_pipeline() {
        let mut config = Config::mock();
        config.llm.backend = "openai".into();

        // SAFETY: no other test reads or writes OPENAI_API_KEY.
        unsafe { std::env::remove_var("OPENAI_API_KEY") };
        for api_key in [None, Some(ApiKey(String::new()))] {
            config.llm.api_key = api_key;
            let pipeline = FixPipeline::from_config(&config).unwrap();
            assert!(pipeline.client.is_none());

            let response = pipeline.run(request("print(x)", "NameError")).await;
            assert_eq!(response.status, ResponseStatus::Success);
            assert_eq!(kinds(&response.logs), [LogKind::Info, LogKind::Error]);
            assert_eq!(
                response.logs[0].message,
                "🚀 System: Connected to OpenAI (mock_model)."
            );
            assert!(response.logs[1].message.contains("Missing OPENAI_API_KEY"));
            assert_eq!(response.fixed_code, MISSING_KEY_PLACEHOLDER);
        }

        // An empty variable counts as missing too.
        unsafe { std::env::set_var("OPENAI_API_KEY", "") };
        config.llm.api_key = None;
        assert!(FixPipeline::from_config(&config).unwrap().client.is_none());
        unsafe { std::env::remove_var("OPENAI_API_KEY") };
    }

    #[tokio::test]
    async fn quota_errors_get_their_own_message() {
        let mock = MockProvider::new().fail("HTTP status client error (429 Too Many Requests)");
        let response = pipeline(Provider::Google, Some(mock))
            .run(request("x", "y"))
            .await;

        assert_eq!(response.status, ResponseStatus::Success);
        let errors: Vec<_> = response
            .logs
            .iter()
            .filter(|entry| entry.kind == LogKind::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].message,
            "⚠️ QUOTA EXCEEDED: Google has temporarily locked this key."
        );
        assert_eq!(response.fixed_code, QUOTA_PLACEHOLDER);
        assert_eq!(response.logs.last(), Some(errors[0]));
    }

    #[tokio::test]
    async fn other_errors_embed_the_provider_message() {
        let mock = MockProvider::new().fail("invalid model");
        let response = pipeline(Provider::OpenAI, Some(mock))
            .run(request("x", "y"))
            .await;

        assert_eq!(
            kinds(&response.logs),
            [LogKind::Info, LogKind::Info, LogKind::Error]
        );
        assert_eq!(response.logs[2].message, "❌ OpenAI Error: invalid model");
        assert_eq!(response.fixed_code, "# Error: invalid model");
        assert_ne!(response.fixed_code, QUOTA_PLACEHOLDER);
    }

    #[test]
    fn quota_detection_is_a_substring_match() {
        assert_eq!(
            Failure::classify(&ProviderError::new("status 429")),
            Failure::QuotaExceeded
        );
        assert_eq!(
            Failure::classify(&ProviderError::new("Resource exhausted (code=4290)")),
            Failure::QuotaExceeded
        );
        assert_eq!(
            Failure::classify(&ProviderError::new("503 unavailable")),
            Failure::Generic("503 unavailable".into())
        );
    }
}
