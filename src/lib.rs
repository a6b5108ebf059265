pub mod core;
pub mod db;
pub mod graph;
pub mod llm;
pub mod mcp;
pub mod retrieval;
pub mod utils;

pub use utils::{safe_truncate, safe_truncate_ellipsis};


pub use core::config::CitegraphConfig;
pub use core::error::{CitegraphError, Result};
pub use db::{HelixClient, HelixClientError};
pub use graph::{GraphStore, HelixGraphStore, InMemoryGraphStore};
pub use llm::embeddings::{Embedder, EmbeddingGenerator};
pub use retrieval::{ContextMode, GraphRagPipeline, PipelineResult};


pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";


pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";


pub const DEFAULT_LLM_MODEL: &str = "llama3.1:8b";


pub const DEFAULT_HELIX_PORT: u16 = 6969;


pub const DEFAULT_EVIDENCE_TEXT_LIMIT: usize = 300;
