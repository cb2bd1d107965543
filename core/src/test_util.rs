//! Place to put utilities that are only used by tests.

use crate::llm::{CompletionProvider, Prompt, ProviderError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Returns a new temporary directory. Unlike the defaults in the `tempdir` and `tempfile` crates,
/// this directory is not world-accessible by default.
#[cfg(not(miri))]
pub fn tempdir() -> std::io::Result<tempfile::TempDir> {
    use std::fs::Permissions;
    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(Permissions::from_mode(0o700));
    }
    builder.tempdir()
}

/// Every prompt a [MockProvider] has been asked to complete, in order.
pub type PromptLog = Arc<Mutex<Vec<Prompt>>>;

/// A completion provider that can be programmed to answer or fail, for testing code that
/// talks to a model.
pub struct MockProvider {
    response: Result<String, ProviderError>,
    delay: Option<Duration>,
    prompts: PromptLog,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder-style API for configuring how this MockProvider behaves.
///
/// # Example
/// ```
/// use codefix_core::test_util::MockProvider;
/// let provider = MockProvider::new().respond("print('fixed')");
/// ```
impl MockProvider {
    /// Creates a new MockProvider that answers with an empty string.
    pub fn new() -> MockProvider {
        MockProvider {
            response: Ok(String::new()),
            delay: None,
            prompts: PromptLog::default(),
        }
    }

    /// Returns this MockProvider in a box. For use when a `Box<dyn CompletionProvider>` is
    /// needed.
    pub fn boxed(self) -> Box<MockProvider> {
        self.into()
    }

    /// Sets the text returned by `complete`.
    pub fn respond(mut self, text: &str) -> MockProvider {
        self.response = Ok(text.to_string());
        self
    }

    /// Makes `complete` fail with `raw_message`.
    pub fn fail(mut self, raw_message: &str) -> MockProvider {
        self.response = Err(ProviderError::new(raw_message));
        self
    }

    /// Sleeps for `delay` before answering.
    pub fn delay(mut self, delay: Duration) -> MockProvider {
        self.delay = Some(delay);
        self
    }

    /// Handle to the prompts received so far. Stays valid after the provider is boxed.
    pub fn prompts(&self) -> PromptLog {
        self.prompts.clone()
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    async fn complete(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.response.clone()
    }
}
