

pub mod base;
pub mod ollama;
pub mod openai;

pub use base::{generate_with_timeout, Generation, LlmMetadata, LlmProvider, LlmProviderError};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
