mod client;
pub(crate) mod types;

use crate::traits::ChatAgent;
use anyhow::{anyhow, Result};
use async_trait::async_trait;

use client::ClaudeClient;

// =============================================================================
// Claude Agent
// =============================================================================

#[derive(Clone)]
pub struct Claude {
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: Option<String>,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 4096,
            base_url: None,
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn client(&self) -> ClaudeClient {
        let client = ClaudeClient::new(&self.api_key);
        if let Some(ref url) = self.base_url {
            client.with_base_url(url)
        } else {
            client
        }
    }
}

#[async_trait]
impl ChatAgent for Claude {
    async fn answer(&self, system: &str, user: &str) -> Result<String> {
        let request = types::ChatRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![types::WireMessage::user(user)],
            system: Some(system.to_string()),
            temperature: None,
        };

        let response = self.client().chat(&request).await?;
        let text = response.text();
        if text.is_empty() {
            return Err(anyhow!("No response from Claude"));
        }
        Ok(text)
    }

    fn provider(&self) -> &str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claude_new() {
        let ai = Claude::new("sk-ant-test", "claude-sonnet-4-20250514");
        assert_eq!(ai.model(), "claude-sonnet-4-20250514");
        assert_eq!(ai.max_tokens, 4096);
    }

    #[test]
    fn test_claude_with_max_tokens() {
        let ai = Claude::new("sk-ant-test", "claude-sonnet-4-20250514").with_max_tokens(8192);
        assert_eq!(ai.max_tokens, 8192);
    }
}
