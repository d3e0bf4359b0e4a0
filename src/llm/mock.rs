use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::llm::provider::LLMProvider;

/// Scripted provider for tests and dry runs.
///
/// Each call pops the next queued result. Once the queue is drained the
/// provider either answers with a canned text or keeps failing.
pub struct MockProvider {
    name: String,
    responses: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
    fail_when_drained: bool,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            delay: None,
            fail_when_drained: false,
        }
    }

    /// A provider whose every call fails.
    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            fail_when_drained: true,
            ..Self::new(name)
        }
    }

    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.queue().push_back(Ok(text.into()));
        self
    }

    pub fn with_error(self, error: Error) -> Self {
        self.queue().push_back(Err(error));
        self
    }

    /// Sleeps before answering, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String>>> {
        self.responses.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LLMProvider for MockProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.queue().pop_front();
        match next {
            Some(result) => result,
            None if self.fail_when_drained => Err(Error::LLMApi {
                provider: self.name.clone(),
                message: "provider disabled".to_string(),
            }),
            None => Ok("Mock response".to_string()),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pops_queue_then_defaults() {
        let mock = MockProvider::new("mock")
            .with_response("first")
            .with_error(Error::ParseError("bad".into()));

        assert_eq!(mock.complete("a").await.unwrap(), "first");
        assert!(mock.complete("b").await.is_err());
        assert_eq!(mock.complete("c").await.unwrap(), "Mock response");
        assert_eq!(mock.prompts(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_failing_never_answers() {
        let mock = MockProvider::failing("down");
        assert!(mock.complete("a").await.is_err());
        assert!(mock.complete("b").await.is_err());
        assert_eq!(mock.call_count(), 2);
    }
}
