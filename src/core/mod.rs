

pub mod config;
pub mod error;

pub use config::{
    CitegraphConfig, EmbeddingConfig, LlmConfig, RetrievalConfig, StoreConfig, VerificationConfig,
};
pub use error::{CitegraphError, GenerationCall, Result};
