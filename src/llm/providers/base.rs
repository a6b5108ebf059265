

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;


#[derive(Error, Debug)]
pub enum LlmProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Generation timed out after {0}ms")]
    Timeout(u64),
}


#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LlmMetadata {
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_prompt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_completion: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_total: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    pub metadata: LlmMetadata,
}


#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<Generation, LlmProviderError>;

    fn provider_name(&self) -> &str;

    fn model_name(&self) -> &str;
}


#[async_trait]
impl LlmProvider for Arc<dyn LlmProvider> {
    async fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<Generation, LlmProviderError> {
        (**self).generate(prompt, system_prompt).await
    }

    fn provider_name(&self) -> &str {
        (**self).provider_name()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}


/// Runs one generation call bounded by `timeout`.
pub async fn generate_with_timeout<P: LlmProvider + ?Sized>(
    provider: &P,
    prompt: &str,
    system_prompt: Option<&str>,
    timeout: Duration,
) -> Result<Generation, LlmProviderError> {
    match tokio::time::timeout(timeout, provider.generate(prompt, system_prompt)).await {
        Ok(result) => result,
        Err(_) => Err(LlmProviderError::Timeout(timeout.as_millis() as u64)),
    }
}


/// Chat messages for an optional system prompt followed by the user prompt.
pub(crate) fn chat_messages(prompt: &str, system_prompt: Option<&str>) -> Vec<(&'static str, String)> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system_prompt.filter(|s| !s.trim().is_empty()) {
        messages.push(("system", system.to_string()));
    }
    messages.push(("user", prompt.to_string()));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_messages_skip_missing_system_prompt() {
        let with_system = chat_messages("route this", Some("cite evidence"));
        assert_eq!(with_system.len(), 2);
        assert_eq!(with_system[0].0, "system");

        let without = chat_messages("route this", None);
        assert_eq!(without, vec![("user", "route this".to_string())]);
    }
}
