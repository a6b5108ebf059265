use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use super::evidence::{flatten_evidence, serialize_evidence, EvidenceBlock};
use super::prompt::{build_cited_prompt, build_flat_prompt, CITED_SYSTEM_PROMPT, FLAT_SYSTEM_PROMPT};
use super::pruning::prune;
use super::repair::verify_and_repair;
use super::scoring::{normalize, select_seeds};
use super::stage::{QueryStage, StageTracker};
use super::traversal::{GraphTraversal, TraversalStats};
use crate::core::config::CitegraphConfig;
use crate::core::error::{CitegraphError, GenerationCall, Result};
use crate::db::HelixClient;
use crate::graph::{GraphEdge, GraphNode, GraphStore, HelixGraphStore, InMemoryGraphStore, StoreError};
use crate::llm::embeddings::{Embedder, EmbeddingError};
use crate::llm::factory::{EmbeddingProviderFactory, LlmProviderFactory};
use crate::llm::providers::{generate_with_timeout, LlmMetadata, LlmProvider};
use crate::utils::safe_truncate_ellipsis;


#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, schemars::JsonSchema, clap::ValueEnum,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContextMode {
    #[default]
    Cited,
    Flat,
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedEvidence {
    pub seeds: Vec<GraphNode>,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub evidence: EvidenceBlock,
    pub traversal: TraversalStats,
    pub pruned_nodes: usize,
    pub pruned_edges: usize,
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub query_id: Uuid,
    pub query: String,
    pub mode: ContextMode,
    pub output: String,
    pub context: String,
    pub num_nodes: usize,
    pub num_edges: usize,
    pub evidence_ids: Vec<String>,
    pub was_regenerated: bool,
    pub repair_attempts: u32,
    pub invalid_citations: Vec<String>,
    pub final_stage: QueryStage,
    pub generations: Vec<LlmMetadata>,
    pub latency_ms: u64,
    pub completed_at: DateTime<Utc>,
}


/// Seed, expand, prune, serialize, generate and verify for one query.
///
/// Holds no per-query state; every call builds its own traversal context.
#[derive(Clone)]
pub struct GraphRagPipeline {
    store: Arc<dyn GraphStore>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn LlmProvider>,
    config: CitegraphConfig,
}

impl GraphRagPipeline {
    pub fn new(
        store: Arc<dyn GraphStore>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn LlmProvider>,
        config: CitegraphConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            generator,
            config,
        }
    }

    /// Wires the configured backends. A snapshot path replaces HelixDB with
    /// the in-memory store.
    pub fn from_config(config: CitegraphConfig, snapshot: Option<&Path>) -> Result<Self> {
        config.validate()?;

        let store: Arc<dyn GraphStore> = match snapshot {
            Some(path) => {
                info!("Using graph snapshot {}", path.display());
                Arc::new(InMemoryGraphStore::load(path)?)
            }
            None => {
                let client = HelixClient::new(&config.store);
                info!("Using HelixDB at {}", client.base_url());
                Arc::new(HelixGraphStore::new(Arc::new(client)))
            }
        };
        let embedder: Arc<dyn Embedder> = Arc::new(EmbeddingProviderFactory::from_config(&config.embedding)?);
        let generator = LlmProviderFactory::from_config(&config.llm)?;

        Ok(Self::new(store, embedder, generator, config))
    }

    pub fn config(&self) -> &CitegraphConfig {
        &self.config
    }

    pub async fn retrieve(&self, query: &str) -> Result<RetrievedEvidence> {
        let mut stages = StageTracker::new();
        self.retrieve_tracked(query, &mut stages).await
    }

    async fn retrieve_tracked(&self, query: &str, stages: &mut StageTracker) -> Result<RetrievedEvidence> {
        let retrieval = &self.config.retrieval;
        let query_vec = self.embed_query(query).await?;

        let candidates = self.fetch_candidates().await?;
        let seeds = select_seeds(&query_vec, candidates, retrieval.seed_k, retrieval.missing_embedding);
        info!("Selected {} seeds", seeds.len());
        stages.advance(QueryStage::Seeded)?;

        let traversal = GraphTraversal::new(self.store.as_ref(), &self.config.policy, self.config.store_timeout());
        let expanded = traversal.expand(seeds.clone(), retrieval.max_hops).await;
        stages.advance(QueryStage::Expanded)?;

        let pruned = prune(
            &query_vec,
            expanded.nodes,
            expanded.edges,
            retrieval.prune_threshold,
            retrieval.missing_embedding,
        );
        stages.advance(QueryStage::Pruned)?;

        let evidence = serialize_evidence(&pruned.nodes, &pruned.edges, retrieval.evidence_text_limit);
        stages.advance(QueryStage::Serialized)?;

        Ok(RetrievedEvidence {
            seeds,
            nodes: pruned.nodes,
            edges: pruned.edges,
            evidence,
            traversal: expanded.stats,
            pruned_nodes: pruned.dropped_nodes,
            pruned_edges: pruned.dropped_edges,
        })
    }

    pub async fn run(&self, query: &str, mode: ContextMode) -> Result<PipelineResult> {
        let query_id = Uuid::new_v4();
        let span = info_span!("query", id = %query_id, mode = %mode);
        self.run_inner(query_id, query, mode).instrument(span).await
    }

    async fn run_inner(&self, query_id: Uuid, query: &str, mode: ContextMode) -> Result<PipelineResult> {
        let started = Instant::now();
        info!("Query: {}", safe_truncate_ellipsis(query, 80));
        let mut stages = StageTracker::new();
        let retrieved = self.retrieve_tracked(query, &mut stages).await?;

        let (context, prompt, system_prompt) = match mode {
            ContextMode::Cited => {
                let context = retrieved.evidence.context.clone();
                let prompt = build_cited_prompt(&context, query);
                (context, prompt, CITED_SYSTEM_PROMPT)
            }
            ContextMode::Flat => {
                let context = flatten_evidence(&retrieved.nodes, self.config.retrieval.evidence_text_limit);
                let prompt = build_flat_prompt(&context, query);
                (context, prompt, FLAT_SYSTEM_PROMPT)
            }
        };

        let timeout = self.config.llm_timeout();
        let mut primary = generate_with_timeout(self.generator.as_ref(), &prompt, Some(system_prompt), timeout)
            .await
            .map_err(|e| CitegraphError::generation(GenerationCall::Primary, context.clone(), e))?;
        primary.metadata.purpose = Some("answer".to_string());
        stages.advance(QueryStage::Answered)?;

        let mut generations = vec![primary.metadata];
        let mut output = primary.text;
        let mut was_regenerated = false;
        let mut repair_attempts = 0;
        let mut invalid_citations = Vec::new();

        if mode == ContextMode::Cited {
            let outcome = verify_and_repair(
                self.generator.as_ref(),
                output,
                &retrieved.evidence,
                self.config.verification.max_repair_attempts,
                timeout,
            )
            .await?;

            output = outcome.answer;
            was_regenerated = outcome.was_regenerated;
            repair_attempts = outcome.attempts;
            invalid_citations = outcome.initial_check.invalid;
            generations.extend(outcome.generations);
            stages.advance(if was_regenerated {
                QueryStage::Repaired
            } else {
                QueryStage::Verified
            })?;
        }

        let final_stage = stages
            .current()
            .ok_or_else(|| CitegraphError::Internal("query finished without a stage".to_string()))?;
        let latency_ms = started.elapsed().as_millis() as u64;

        info!(
            "Query done: {} nodes, {} edges, stage {}, regenerated={}, {}ms",
            retrieved.nodes.len(),
            retrieved.edges.len(),
            final_stage,
            was_regenerated,
            latency_ms
        );

        Ok(PipelineResult {
            query_id,
            query: query.to_string(),
            mode,
            output,
            context,
            num_nodes: retrieved.nodes.len(),
            num_edges: retrieved.edges.len(),
            evidence_ids: retrieved.evidence.valid_ids.tokens().collect(),
            was_regenerated,
            repair_attempts,
            invalid_citations,
            final_stage,
            generations,
            latency_ms,
            completed_at: Utc::now(),
        })
    }

    /// Runs independent queries with at most `concurrency` in flight.
    /// Results come back in input order.
    pub async fn run_many(&self, queries: &[String], mode: ContextMode, concurrency: usize) -> Vec<Result<PipelineResult>> {
        stream::iter(queries.iter())
            .map(|query| self.run(query, mode))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let timeout = self.config.embedding_timeout();
        let raw = match tokio::time::timeout(timeout, self.embedder.embed(query)).await {
            Ok(result) => result?,
            Err(_) => return Err(EmbeddingError::Timeout(timeout.as_millis() as u64).into()),
        };
        normalize(&raw).ok_or_else(|| EmbeddingError::ZeroVector.into())
    }

    async fn fetch_candidates(&self) -> Result<Vec<GraphNode>> {
        let timeout = self.config.store_timeout();
        match tokio::time::timeout(timeout, self.store.fetch_embedded_nodes()).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StoreError::Timeout {
                query: "fetch_embedded_nodes".to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }
            .into()),
        }
    }
}
