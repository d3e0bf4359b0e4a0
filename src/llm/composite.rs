use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::llm::claude::ClaudeProvider;
use crate::llm::offline::OfflineGenerator;
use crate::llm::openai::OpenAiProvider;
use crate::llm::provider::LLMProvider;

/// Where a completion came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionSource {
    Remote(String),
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub source: CompletionSource,
}

impl Completion {
    pub fn is_offline(&self) -> bool {
        self.source == CompletionSource::Offline
    }

    pub fn source_name(&self) -> &str {
        match &self.source {
            CompletionSource::Remote(name) => name,
            CompletionSource::Offline => "offline",
        }
    }
}

/// Ordered provider chain ending in the offline generator.
pub struct CompositeProvider {
    providers: Vec<Arc<dyn LLMProvider>>,
    offline: OfflineGenerator,
}

impl CompositeProvider {
    pub fn new(providers: Vec<Arc<dyn LLMProvider>>) -> Self {
        Self {
            providers,
            offline: OfflineGenerator::new(),
        }
    }

    pub fn offline_only() -> Self {
        Self::new(Vec::new())
    }

    /// Claude first, then OpenAI, for whichever keys are configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut providers: Vec<Arc<dyn LLMProvider>> = Vec::new();

        if let Some(key) = &config.anthropic_api_key {
            providers.push(Arc::new(ClaudeProvider::new(
                key.clone(),
                Some(config.anthropic_model.clone()),
            )?));
        }
        if let Some(key) = &config.openai_api_key {
            providers.push(Arc::new(
                OpenAiProvider::new(key.clone(), Some(config.openai_model.clone()))?
                    .with_base_url(config.openai_base_url.clone()),
            ));
        }

        if providers.is_empty() {
            tracing::warn!("No LLM API key configured, using offline analysis only");
        } else {
            let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
            tracing::info!("LLM provider chain: {}", names.join(" -> "));
        }

        Ok(Self::new(providers))
    }

    /// Tries each provider in order, each raced against `timeout`. A failure,
    /// a timeout or an empty answer moves on to the next one. Never fails.
    pub async fn complete(&self, prompt: &str, timeout: Duration) -> Completion {
        for provider in &self.providers {
            match call_with_timeout(provider.as_ref(), prompt, timeout).await {
                Ok(text) => {
                    tracing::debug!("{} answered ({} chars)", provider.name(), text.len());
                    return Completion {
                        text,
                        source: CompletionSource::Remote(provider.name().to_string()),
                    };
                }
                Err(e) => {
                    tracing::warn!("{} failed, trying next provider: {}", provider.name(), e);
                }
            }
        }

        Completion {
            text: self.offline.generate(prompt),
            source: CompletionSource::Offline,
        }
    }
}

async fn call_with_timeout(
    provider: &dyn LLMProvider,
    prompt: &str,
    timeout: Duration,
) -> Result<String> {
    let text = tokio::time::timeout(timeout, provider.complete(prompt))
        .await
        .map_err(|_| Error::Timeout {
            provider: provider.name().to_string(),
            secs: timeout.as_secs(),
        })??;

    if text.trim().is_empty() {
        return Err(Error::EmptyCompletion(provider.name().to_string()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockProvider;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_first_success_wins_after_failures() {
        let chain = CompositeProvider::new(vec![
            Arc::new(MockProvider::failing("a")),
            Arc::new(MockProvider::failing("b")),
            Arc::new(MockProvider::new("c").with_response("a,b,c")),
        ]);

        let completion = chain.complete("prompt", TIMEOUT).await;
        assert_eq!(completion.text, "a,b,c");
        assert_eq!(completion.source, CompletionSource::Remote("c".into()));
    }

    #[tokio::test]
    async fn test_timeout_and_empty_skip_to_next() {
        let slow = Arc::new(
            MockProvider::new("slow")
                .with_response("too late")
                .with_delay(Duration::from_secs(60)),
        );
        let empty = Arc::new(MockProvider::new("empty").with_response("   "));
        let good = Arc::new(MockProvider::new("good").with_response("bug"));

        let chain = CompositeProvider::new(vec![
            slow.clone() as Arc<dyn LLMProvider>,
            empty.clone(),
            good,
        ]);
        let completion = chain.complete("prompt", Duration::from_millis(50)).await;

        assert_eq!(completion.text, "bug");
        assert_eq!(completion.source_name(), "good");
        assert_eq!(slow.call_count(), 1);
        assert_eq!(empty.call_count(), 1);
    }

    #[tokio::test]
    async fn test_all_failing_goes_offline() {
        let chain = CompositeProvider::new(vec![Arc::new(MockProvider::failing("a"))]);
        let completion = chain.complete("free text", TIMEOUT).await;
        assert!(completion.is_offline());
        assert!(!completion.text.is_empty());
    }
}
