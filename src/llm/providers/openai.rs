use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::base::{chat_messages, Generation, LlmMetadata, LlmProvider, LlmProviderError};

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}


/// Any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiProvider {
    api_key: String,
    base_url: String,
    model: String,
    temperature: f64,
    top_p: Option<f64>,
    max_tokens: Option<u32>,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(
        api_key: impl Into<String>,
        base_url: Option<String>,
        model: impl Into<String>,
        temperature: f64,
        timeout: Duration,
    ) -> Result<Self, LlmProviderError> {
        let model = model.into();
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string());
        info!("OpenAI-compatible provider initialized (model={}, url={})", model, base_url);
        Ok(Self {
            api_key: api_key.into(),
            base_url,
            model,
            temperature,
            top_p: None,
            max_tokens: None,
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    pub fn with_sampling(mut self, top_p: Option<f64>, max_tokens: Option<u32>) -> Self {
        self.top_p = top_p;
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<Generation, LlmProviderError> {
        let messages = chat_messages(prompt, system_prompt)
            .into_iter()
            .map(|(role, content)| ChatMessage {
                role: role.to_string(),
                content,
            })
            .collect();

        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?
            .error_for_status()
            .map_err(LlmProviderError::Http)?
            .json::<ChatResponse>()
            .await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmProviderError::Provider("No choices in response".to_string()))?;

        let mut metadata = LlmMetadata {
            provider: "openai".to_string(),
            model: self.model.clone(),
            base_url: Some(self.base_url.clone()),
            ..Default::default()
        };

        if let Some(usage) = response.usage {
            metadata.tokens_prompt = Some(usage.prompt_tokens);
            metadata.tokens_completion = Some(usage.completion_tokens);
            metadata.tokens_total = Some(usage.total_tokens);
        }

        Ok(Generation { text, metadata })
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
