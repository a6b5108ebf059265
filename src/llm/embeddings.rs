use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::core::config::EmbeddingConfig;


#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Empty text")]
    EmptyText,

    #[error("Embedding has zero norm")]
    ZeroVector,

    #[error("Provider not implemented: {0}")]
    NotImplemented(String),

    #[error("Embedding timed out after {0}ms")]
    Timeout(u64),
}


/// Turns query text into a fixed-dimension vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for std::sync::Arc<T> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        (**self).embed(text).await
    }
}


#[derive(Serialize)]
struct OllamaEmbeddingRequest {
    model: String,
    prompt: String,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct OpenAIEmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
}


pub struct EmbeddingGenerator {
    provider: String,
    url: String,
    model: String,
    api_key: Option<String>,
    client: Client,
}

impl EmbeddingGenerator {
    pub fn new(
        provider: impl Into<String>,
        url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let provider = provider.into().to_lowercase();
        let model = model.into();
        let url = url.into().trim_end_matches('/').to_string();

        if provider != "ollama" && provider != "openai" {
            return Err(EmbeddingError::NotImplemented(provider));
        }

        info!("EmbeddingGenerator initialized: provider={}, model={}", provider, model);

        Ok(Self {
            provider,
            url,
            model,
            api_key,
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        Self::new(
            config.provider.clone(),
            config.url.clone(),
            config.model.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn generate_ollama(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let request = OllamaEmbeddingRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.url))
            .json(&request)
            .send()
            .await?
            .error_for_status()
            .map_err(EmbeddingError::Http)?
            .json::<OllamaEmbeddingResponse>()
            .await?;

        Ok(response.embedding)
    }

    async fn generate_openai(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| EmbeddingError::InvalidResponse("API key required".to_string()))?;

        let request = OpenAIEmbeddingRequest {
            model: self.model.clone(),
            input: text.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.url))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await?
            .error_for_status()
            .map_err(EmbeddingError::Http)?
            .json::<OpenAIEmbeddingResponse>()
            .await?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::InvalidResponse("No embedding in response".to_string()))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }
}

#[async_trait]
impl Embedder for EmbeddingGenerator {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyText);
        }

        let embedding = match self.provider.as_str() {
            "ollama" => self.generate_ollama(text).await?,
            "openai" => self.generate_openai(text).await?,
            other => return Err(EmbeddingError::NotImplemented(other.to_string())),
        };

        if embedding.is_empty() {
            return Err(EmbeddingError::InvalidResponse("empty embedding".to_string()));
        }
        debug!("Embedded {} chars -> {} dims", text.len(), embedding.len());
        Ok(embedding)
    }
}
