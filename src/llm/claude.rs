use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::llm::prompts::SYSTEM_PROMPT;
use crate::llm::provider::LLMProvider;

pub struct ClaudeProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    error: Option<ClaudeError>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct ClaudeError {
    message: String,
}

impl ClaudeProvider {
    pub fn new(api_key: String, model: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: model.unwrap_or_else(|| "claude-sonnet-4-20250514".to_string()),
            base_url: "https://api.anthropic.com".to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn api_error(&self, message: String) -> Error {
        Error::LLMApi {
            provider: self.name().to_string(),
            message,
        }
    }
}

#[async_trait]
impl LLMProvider for ClaudeProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        tracing::debug!("Sending ~{} tokens to Claude", prompt.len() / 4);

        let request_body = ClaudeRequest {
            model: self.model.clone(),
            max_tokens: 1024,
            system: Some(SYSTEM_PROMPT.to_string()),
            messages: vec![ClaudeMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| self.api_error(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.api_error(format!("Claude API error ({}): {}", status, body)));
        }

        let result: ClaudeResponse = response
            .json()
            .await
            .map_err(|e| Error::ParseError(format!("Failed to parse Claude response: {}", e)))?;

        if let Some(error) = result.error {
            return Err(self.api_error(error.message));
        }

        let text = result
            .content
            .into_iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(Error::EmptyCompletion(self.name().to_string()));
        }

        Ok(text)
    }

    fn name(&self) -> &str {
        "Claude"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_extracts_text_blocks() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "key")
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "content": [
                        {"type": "text", "text": "bug, "},
                        {"type": "text", "text": "crash"}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let provider = ClaudeProvider::new("key".into(), None)
            .unwrap()
            .with_base_url(server.url());
        assert_eq!(provider.complete("tags?").await.unwrap(), "bug, crash");
    }

    #[tokio::test]
    async fn test_error_status_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_body("overloaded")
            .create_async()
            .await;

        let provider = ClaudeProvider::new("key".into(), None)
            .unwrap()
            .with_base_url(server.url());
        let err = provider.complete("tags?").await.unwrap_err();
        assert!(matches!(err, Error::LLMApi { .. }));
    }
}
