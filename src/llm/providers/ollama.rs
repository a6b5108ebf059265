use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::base::{chat_messages, Generation, LlmMetadata, LlmProvider, LlmProviderError};

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}


pub struct OllamaProvider {
    base_url: String,
    model: String,
    temperature: f64,
    top_p: Option<f64>,
    max_tokens: Option<u32>,
    client: Client,
}

impl OllamaProvider {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        temperature: f64,
        timeout: Duration,
    ) -> Result<Self, LlmProviderError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let model = model.into();
        info!("Ollama provider initialized (model={}, url={})", model, base_url);
        Ok(Self {
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
impl LlmProvider for OllamaProvider {
    async fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<Generation, LlmProviderError> {
        let messages = chat_messages(prompt, system_prompt)
            .into_iter()
            .map(|(role, content)| OllamaMessage {
                role: role.to_string(),
                content,
            })
            .collect();

        let request = OllamaRequest {
            model: self.model.clone(),
            messages,
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
                top_p: self.top_p,
                num_predict: self.max_tokens,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()
            .map_err(LlmProviderError::Http)?
            .json::<OllamaResponse>()
            .await?;

        let metadata = LlmMetadata {
            provider: "ollama".to_string(),
            model: self.model.clone(),
            base_url: Some(self.base_url.clone()),
            tokens_prompt: Some(response.prompt_eval_count),
            tokens_completion: Some(response.eval_count),
            tokens_total: Some(response.prompt_eval_count + response.eval_count),
            ..Default::default()
        };

        Ok(Generation {
            text: response.message.content,
            metadata,
        })
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
