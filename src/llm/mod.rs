

pub mod embeddings;
pub mod factory;
pub mod providers;

pub use embeddings::{Embedder, EmbeddingError, EmbeddingGenerator};
pub use factory::{EmbeddingProviderFactory, LlmProviderFactory};
pub use providers::{Generation, LlmMetadata, LlmProvider, LlmProviderError};
