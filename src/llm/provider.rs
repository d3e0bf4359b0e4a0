use async_trait::async_trait;

use crate::error::Result;

/// A text-completion backend behind a uniform prompt-in, text-out contract.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
    fn name(&self) -> &str;
}
