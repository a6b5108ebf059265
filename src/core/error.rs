use thiserror::Error;

use crate::graph::store::StoreError;
use crate::llm::embeddings::EmbeddingError;
use crate::llm::providers::LlmProviderError;


#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GenerationCall {
    Primary,
    Repair,
}


#[derive(Error, Debug)]
pub enum CitegraphError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Graph store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("Embedding generation error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Generation failed on {call} call: {source}")]
    Generation {
        call: GenerationCall,
        /// Serialized evidence that was assembled before the failure.
        context: String,
        #[source]
        source: LlmProviderError,
    },

    #[error("Malformed node: {0}")]
    MalformedNode(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CitegraphError {
    pub fn generation(call: GenerationCall, context: impl Into<String>, source: LlmProviderError) -> Self {
        Self::Generation {
            call,
            context: context.into(),
            source,
        }
    }

    /// Evidence context carried by a generation failure, if any.
    pub fn partial_context(&self) -> Option<&str> {
        match self {
            Self::Generation { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Whether the failure means a backing service could not be reached,
    /// as opposed to bad input or configuration.
    pub fn is_service_failure(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_) | Self::Embedding(_) | Self::Generation { .. }
        )
    }
}


pub type Result<T> = std::result::Result<T, CitegraphError>;
