use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use super::error::{CitegraphError, Result};
use crate::retrieval::policy::ExpansionPolicy;
use crate::retrieval::scoring::MissingEmbeddingPolicy;


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: crate::DEFAULT_HELIX_PORT,
            api_key: None,
            timeout_secs: 10,
            max_retries: 3,
        }
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: crate::DEFAULT_EMBEDDING_MODEL.to_string(),
            url: crate::DEFAULT_OLLAMA_URL.to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f64>,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: crate::DEFAULT_LLM_MODEL.to_string(),
            api_key: None,
            base_url: None,
            temperature: 0.0,
            max_tokens: Some(2048),
            top_p: Some(0.95),
            timeout_secs: 120,
        }
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub seed_k: usize,
    pub max_hops: u32,
    pub prune_threshold: f64,
    pub evidence_text_limit: usize,
    pub missing_embedding: MissingEmbeddingPolicy,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            seed_k: 10,
            max_hops: 3,
            prune_threshold: 0.35,
            evidence_text_limit: crate::DEFAULT_EVIDENCE_TEXT_LIMIT,
            missing_embedding: MissingEmbeddingPolicy::default(),
        }
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub max_repair_attempts: u32,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self { max_repair_attempts: 1 }
    }
}


#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CitegraphConfig {
    pub store: StoreConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    pub verification: VerificationConfig,
    pub policy: ExpansionPolicy,
}

impl CitegraphConfig {
    /// Defaults, then the optional file, then `CITEGRAPH__SECTION__KEY` overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            if !path.exists() {
                return Err(CitegraphError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path));
        }

        let config: Self = builder
            .add_source(Environment::with_prefix("CITEGRAPH").prefix_separator("__").separator("__"))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("CITEGRAPH_HELIX_HOST") {
            config.store.host = host;
        }
        if let Some(port) = std::env::var("CITEGRAPH_HELIX_PORT").ok().and_then(|p| p.parse().ok()) {
            config.store.port = port;
        }
        if let Ok(provider) = std::env::var("CITEGRAPH_LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(model) = std::env::var("CITEGRAPH_LLM_MODEL") {
            config.llm.model = model;
        }
        if let Ok(key) = std::env::var("CITEGRAPH_LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("CITEGRAPH_LLM_BASE_URL") {
            config.llm.base_url = Some(url);
        }
        if let Ok(provider) = std::env::var("CITEGRAPH_EMBEDDING_PROVIDER") {
            config.embedding.provider = provider;
        }
        if let Ok(model) = std::env::var("CITEGRAPH_EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Ok(url) = std::env::var("CITEGRAPH_EMBEDDING_URL") {
            config.embedding.url = url;
        }
        if let Ok(key) = std::env::var("CITEGRAPH_EMBEDDING_API_KEY") {
            config.embedding.api_key = Some(key);
        }
        if let Some(k) = std::env::var("CITEGRAPH_SEED_K").ok().and_then(|v| v.parse().ok()) {
            config.retrieval.seed_k = k;
        }
        if let Some(hops) = std::env::var("CITEGRAPH_MAX_HOPS").ok().and_then(|v| v.parse().ok()) {
            config.retrieval.max_hops = hops;
        }
        if let Some(t) = std::env::var("CITEGRAPH_PRUNE_THRESHOLD").ok().and_then(|v| v.parse().ok()) {
            config.retrieval.prune_threshold = t;
        }

        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.retrieval.seed_k == 0 {
            return Err(CitegraphError::Config("retrieval.seed_k must be at least 1".to_string()));
        }
        if !self.retrieval.prune_threshold.is_finite() {
            return Err(CitegraphError::Config("retrieval.prune_threshold must be finite".to_string()));
        }
        if let MissingEmbeddingPolicy::Fallback { score } = self.retrieval.missing_embedding {
            if !score.is_finite() {
                return Err(CitegraphError::Config(
                    "retrieval.missing_embedding.score must be finite".to_string(),
                ));
            }
        }
        if self.store.timeout_secs == 0 || self.embedding.timeout_secs == 0 || self.llm.timeout_secs == 0 {
            return Err(CitegraphError::Config("timeouts must be greater than zero".to_string()));
        }
        self.policy.validate()
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store.timeout_secs)
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding.timeout_secs)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeLabel;
    use std::io::Write;

    #[test]
    fn test_retrieval_defaults() {
        let config = CitegraphConfig::default();
        assert_eq!(config.retrieval.seed_k, 10);
        assert_eq!(config.retrieval.max_hops, 3);
        assert_eq!(config.retrieval.prune_threshold, 0.35);
        assert_eq!(config.retrieval.evidence_text_limit, 300);
        assert_eq!(config.verification.max_repair_attempts, 1);
        assert_eq!(
            config.retrieval.missing_embedding,
            MissingEmbeddingPolicy::Fallback { score: 0.3 }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_seed_k() {
        let mut config = CitegraphConfig::default();
        config.retrieval.seed_k = 0;
        assert!(matches!(config.validate(), Err(CitegraphError::Config(_))));
    }

    #[test]
    fn test_load_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "retrieval:\n  seed_k: 4\n  prune_threshold: 0.5\n  missing_embedding:\n    mode: exclude\nverification:\n  max_repair_attempts: 2\npolicy:\n  rules:\n    Service:\n      - edge_type: CALLS\n        target_label: Service\n        max_depth: 2\n"
        )
        .unwrap();

        let config = CitegraphConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.retrieval.seed_k, 4);
        assert_eq!(config.retrieval.prune_threshold, 0.5);
        assert_eq!(config.retrieval.max_hops, 3);
        assert_eq!(config.retrieval.missing_embedding, MissingEmbeddingPolicy::Exclude);
        assert_eq!(config.verification.max_repair_attempts, 2);

        let rules = config.policy.rules_for(NodeLabel::Service);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].edge_type, "CALLS");
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let result = CitegraphConfig::load(Some(Path::new("/nonexistent/citegraph.yaml")));
        assert!(matches!(result, Err(CitegraphError::Config(_))));
    }
}
