use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::config::CitegraphConfig;
use crate::core::error::CitegraphError;
use crate::retrieval::{ContextMode, GraphRagPipeline};
use crate::utils::safe_truncate_ellipsis;


#[derive(Debug, serde::Deserialize, rmcp::schemars::JsonSchema)]
pub struct AnswerQueryParams {
    #[schemars(description = "Work intake request, e.g. a new issue description")]
    pub query: String,
    #[schemars(description = "Context mode: 'cited' (default, evidence ids + verification) or 'flat'")]
    pub mode: Option<ContextMode>,
}

#[derive(Debug, serde::Deserialize, rmcp::schemars::JsonSchema)]
pub struct RetrieveEvidenceParams {
    #[schemars(description = "Work intake request to retrieve graph evidence for")]
    pub query: String,
}


#[derive(Clone)]
pub struct CitegraphMcpServer {
    pipeline: Arc<GraphRagPipeline>,
    tool_router: ToolRouter<Self>,
}

impl CitegraphMcpServer {
    pub fn new(pipeline: GraphRagPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            tool_router: Self::tool_router(),
        }
    }

    fn convert_error(err: CitegraphError) -> McpError {
        match &err {
            CitegraphError::Config(_) | CitegraphError::ConfigLoad(_) => McpError::invalid_params(err.to_string(), None),
            CitegraphError::Generation { call, context, .. } => McpError::internal_error(
                err.to_string(),
                Some(json!({ "call": call, "context": context })),
            ),
            _ => McpError::internal_error(err.to_string(), None),
        }
    }

    fn result_to_json<T: Serialize>(result: T) -> Result<String, McpError> {
        serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))
    }
}

#[tool_router]
impl CitegraphMcpServer {
    #[tool(description = "Answer a work intake request from graph evidence. Cites evidence as [E1], [E2]; invalid citations trigger one corrective regeneration. Returns: {output, context, evidence_ids, was_regenerated, invalid_citations, final_stage, ...}")]
    async fn answer_intake_query(
        &self,
        Parameters(params): Parameters<AnswerQueryParams>,
    ) -> Result<CallToolResult, McpError> {
        let mode = params.mode.unwrap_or_default();
        info!("Answering [{}]: '{}'", mode, safe_truncate_ellipsis(&params.query, 50));

        let result = self
            .pipeline
            .run(&params.query, mode)
            .await
            .map_err(Self::convert_error)?;

        if result.was_regenerated {
            warn!("Answer regenerated; invalid citations: {:?}", result.invalid_citations);
        }

        let json = Self::result_to_json(&result)?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Retrieve pruned graph evidence for a request without generating an answer. Returns: {seeds, nodes, edges, evidence: {context, valid_ids, ...}, traversal}")]
    async fn retrieve_evidence(
        &self,
        Parameters(params): Parameters<RetrieveEvidenceParams>,
    ) -> Result<CallToolResult, McpError> {
        info!("Retrieving evidence: '{}'", safe_truncate_ellipsis(&params.query, 50));

        let evidence = self
            .pipeline
            .retrieve(&params.query)
            .await
            .map_err(Self::convert_error)?;

        info!("Found {} evidence blocks", evidence.evidence.entries.len());

        let json = Self::result_to_json(&evidence)?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}


#[tool_handler]
impl ServerHandler for CitegraphMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "citegraph".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "Graph-grounded work intake. Use answer_intake_query to classify, route and find \
                 dependencies for a request with verified evidence citations, or retrieve_evidence \
                 to inspect the evidence alone."
                    .to_string(),
            ),
        }
    }
}


/// Starts the stdio MCP server. `CITEGRAPH_CONFIG` names a config file
/// (otherwise `CITEGRAPH_*` variables are read) and `CITEGRAPH_GRAPH` an
/// optional graph snapshot.
pub async fn run_server() -> anyhow::Result<()> {
    info!("Initializing citegraph MCP server...");

    let config_path = std::env::var_os("CITEGRAPH_CONFIG").map(PathBuf::from);
    let graph_path = std::env::var_os("CITEGRAPH_GRAPH").map(PathBuf::from);

    let config = match config_path {
        Some(path) => CitegraphConfig::load(Some(&path))?,
        None => {
            let config = CitegraphConfig::from_env();
            config.validate()?;
            config
        }
    };
    info!("   LLM: {}/{}", config.llm.provider, config.llm.model);
    info!(
        "   Retrieval: k={}, max_hops={}, threshold={}",
        config.retrieval.seed_k, config.retrieval.max_hops, config.retrieval.prune_threshold
    );

    let pipeline = GraphRagPipeline::from_config(config, graph_path.as_deref())?;

    info!("citegraph MCP server ready");
    let server = CitegraphMcpServer::new(pipeline);
    let service = server.serve(stdio()).await?;
    service.waiting().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InMemoryGraphStore;
    use crate::llm::embeddings::{Embedder, EmbeddingError};
    use crate::llm::providers::{Generation, LlmProvider, LlmProviderError};
    use async_trait::async_trait;

    struct Unused;

    #[async_trait]
    impl Embedder for Unused {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::EmptyText)
        }
    }

    #[async_trait]
    impl LlmProvider for Unused {
        async fn generate(&self, _prompt: &str, _system_prompt: Option<&str>) -> Result<Generation, LlmProviderError> {
            Err(LlmProviderError::Provider("unused".to_string()))
        }

        fn provider_name(&self) -> &str {
            "unused"
        }

        fn model_name(&self) -> &str {
            "unused"
        }
    }

    fn server() -> CitegraphMcpServer {
        CitegraphMcpServer::new(GraphRagPipeline::new(
            Arc::new(InMemoryGraphStore::new()),
            Arc::new(Unused),
            Arc::new(Unused),
            CitegraphConfig::default(),
        ))
    }

    #[test]
    fn test_server_info_exposes_tools_only() {
        let info = server().get_info();
        assert_eq!(info.server_info.name, "citegraph");
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.resources.is_none());
    }

    #[test]
    fn test_answer_params_mode_is_optional() {
        let params: AnswerQueryParams = serde_json::from_value(json!({ "query": "Login crash" })).unwrap();
        assert!(params.mode.is_none());

        let params: AnswerQueryParams =
            serde_json::from_value(json!({ "query": "Login crash", "mode": "flat" })).unwrap();
        assert_eq!(params.mode, Some(ContextMode::Flat));
    }

    #[test]
    fn test_generation_error_keeps_context_in_data() {
        let err = CitegraphError::generation(
            crate::core::error::GenerationCall::Primary,
            "=== EVIDENCE BLOCKS ===",
            LlmProviderError::Provider("overloaded".to_string()),
        );
        let mcp = CitegraphMcpServer::convert_error(err);
        let data = mcp.data.unwrap();
        assert_eq!(data["call"], "primary");
        assert_eq!(data["context"], "=== EVIDENCE BLOCKS ===");
    }
}
