use std::time::Duration;

use anyhow::{Context, Result};

use nutrack_core::advisor::{ChatResponse, chat_request, response_text};

use crate::config::Config;

/// Chat-completion client for AI goal recommendations.
pub struct OpenAiClient {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(url: &str, model: &str, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "nutrack-cli/{} (nutrient tracker)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: url.to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .as_deref()
            .context("OPENAI_API_KEY is not set")?;
        Self::new(&config.openai_url, &config.openai_model, api_key)
    }

    /// Send the prompt and return the first choice's text.
    pub async fn recommend(&self, prompt: &str) -> Result<String> {
        let body = chat_request(&self.model, prompt);
        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to reach the chat completion API")?
            .error_for_status()
            .context("Chat completion API returned an error")?;

        let data: ChatResponse = resp
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        response_text(data).context("Chat completion response had no content")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_OPENAI_URL;
    use nutrack_core::advisor::DEFAULT_MODEL;

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let client = OpenAiClient::new("http://127.0.0.1:9/v1/chat", DEFAULT_MODEL, "k").unwrap();
        assert!(client.recommend("hi").await.is_err());
    }

    // --- Integration tests (hit the real API) ---

    #[tokio::test]
    #[ignore = "hits the OpenAI API and needs OPENAI_API_KEY"]
    async fn test_recommend_returns_text() {
        let key = std::env::var("OPENAI_API_KEY").unwrap();
        let client = OpenAiClient::new(DEFAULT_OPENAI_URL, DEFAULT_MODEL, &key).unwrap();
        let text = client
            .recommend("I'm 30 years old, female. My current nutrient intake today is the following:\niron: 4")
            .await
            .unwrap();
        assert!(!text.trim().is_empty());
    }
}
