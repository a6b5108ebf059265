

use std::sync::Arc;
use std::time::Duration;

use super::embeddings::EmbeddingGenerator;
use super::providers::base::{LlmProvider, LlmProviderError};
use super::providers::ollama::OllamaProvider;
use super::providers::openai::OpenAiProvider;
use crate::core::config::{EmbeddingConfig, LlmConfig};
use crate::core::error::{CitegraphError, Result};
use crate::DEFAULT_OLLAMA_URL;


pub struct LlmProviderFactory;

impl LlmProviderFactory {
    pub fn from_config(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let build_err = |e: LlmProviderError| CitegraphError::Config(format!("cannot build LLM client: {e}"));

        match config.provider.to_lowercase().as_str() {
            "ollama" => {
                let provider = OllamaProvider::new(
                    config.base_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL),
                    config.model.clone(),
                    config.temperature,
                    timeout,
                )
                .map_err(build_err)?
                .with_sampling(config.top_p, config.max_tokens);
                Ok(Arc::new(provider))
            }
            "openai" => {
                let api_key = config
                    .api_key
                    .clone()
                    .ok_or_else(|| CitegraphError::Config("llm.api_key is required for openai".to_string()))?;
                let provider = OpenAiProvider::new(
                    api_key,
                    config.base_url.clone(),
                    config.model.clone(),
                    config.temperature,
                    timeout,
                )
                .map_err(build_err)?
                .with_sampling(config.top_p, config.max_tokens);
                Ok(Arc::new(provider))
            }
            other => Err(CitegraphError::Config(format!(
                "Unknown LLM provider: {other}. Supported: ollama, openai"
            ))),
        }
    }
}


pub struct EmbeddingProviderFactory;

impl EmbeddingProviderFactory {
    pub fn from_config(config: &EmbeddingConfig) -> Result<EmbeddingGenerator> {
        Ok(EmbeddingGenerator::from_config(config)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_provider() {
        let provider = LlmProviderFactory::from_config(&LlmConfig::default()).unwrap();
        assert_eq!(provider.provider_name(), "ollama");
        assert_eq!(provider.model_name(), crate::DEFAULT_LLM_MODEL);
    }

    #[test]
    fn test_create_openai_provider() {
        let config = LlmConfig {
            provider: "OpenAI".to_string(),
            model: "gpt-4o-2024-05-13".to_string(),
            api_key: Some("test-key".to_string()),
            ..Default::default()
        };
        let provider = LlmProviderFactory::from_config(&config).unwrap();
        assert_eq!(provider.provider_name(), "openai");
    }

    #[test]
    fn test_openai_without_key_is_config_error() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            ..Default::default()
        };
        assert!(matches!(LlmProviderFactory::from_config(&config), Err(CitegraphError::Config(_))));
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let config = LlmConfig {
            provider: "unknown".to_string(),
            ..Default::default()
        };
        let err = LlmProviderFactory::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("Unknown LLM provider"));
    }
}
