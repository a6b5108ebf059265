use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::models::{normalize_confidence, GraphNode, Neighbor, NodeLabel};
use crate::db::{HelixClient, HelixClientError};


#[derive(Error, Debug)]
pub enum StoreError {
    #[error("HelixDB error: {0}")]
    Client(#[from] HelixClientError),

    #[error("Store query '{query}' timed out after {timeout_ms}ms")]
    Timeout { query: String, timeout_ms: u64 },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}


/// Read-only query surface of the knowledge graph.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// All nodes carrying an embedding, in store order.
    async fn fetch_embedded_nodes(&self) -> Result<Vec<GraphNode>, StoreError>;

    /// Directed one-hop lookup `(node_id)-[edge_type]->(target_label)`.
    async fn fetch_neighbors(
        &self,
        node_id: &str,
        edge_type: &str,
        target_label: NodeLabel,
    ) -> Result<Vec<Neighbor>, StoreError>;
}

#[async_trait]
impl<T: GraphStore + ?Sized> GraphStore for Arc<T> {
    async fn fetch_embedded_nodes(&self) -> Result<Vec<GraphNode>, StoreError> {
        (**self).fetch_embedded_nodes().await
    }

    async fn fetch_neighbors(
        &self,
        node_id: &str,
        edge_type: &str,
        target_label: NodeLabel,
    ) -> Result<Vec<Neighbor>, StoreError> {
        (**self).fetch_neighbors(node_id, edge_type, target_label).await
    }
}


/// Parses raw records, skipping the malformed ones with a warning.
pub fn parse_node_records(records: &[serde_json::Value]) -> Vec<GraphNode> {
    records
        .iter()
        .filter_map(|record| match GraphNode::from_record(record) {
            Ok(node) => Some(node),
            Err(e) => {
                warn!("Skipping node record: {}", e);
                None
            }
        })
        .collect()
}


/// Parses one-hop lookup records for `(node_id)-[edge_type]->`. A record
/// without its own `edge_type` takes the requested one; confidence defaults
/// to 0.5 and is clamped to [0, 1].
pub fn parse_neighbor_records(node_id: &str, edge_type: &str, records: &[serde_json::Value]) -> Vec<Neighbor> {
    records
        .iter()
        .filter_map(|record| {
            let node = match GraphNode::from_record(record) {
                Ok(node) => node,
                Err(e) => {
                    warn!("Skipping neighbor of {}: {}", node_id, e);
                    return None;
                }
            };
            let relation = record
                .get("edge_type")
                .and_then(|v| v.as_str())
                .unwrap_or(edge_type)
                .to_string();
            Some(Neighbor {
                node,
                edge_type: relation,
                confidence: normalize_confidence(record.get("confidence").and_then(|v| v.as_f64())),
            })
        })
        .collect()
}


#[derive(Deserialize)]
struct EmbeddedNodesResponse {
    #[serde(default)]
    nodes: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct NeighborsResponse {
    #[serde(default)]
    neighbors: Vec<serde_json::Value>,
}


/// Graph store backed by HelixDB named queries.
pub struct HelixGraphStore {
    client: Arc<HelixClient>,
}

impl HelixGraphStore {
    pub fn new(client: Arc<HelixClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl GraphStore for HelixGraphStore {
    async fn fetch_embedded_nodes(&self) -> Result<Vec<GraphNode>, StoreError> {
        let response: EmbeddedNodesResponse = self
            .client
            .execute_query("getEmbeddedNodes", &serde_json::json!({}))
            .await?;

        let nodes = parse_node_records(&response.nodes);
        debug!("getEmbeddedNodes: {} records, {} usable", response.nodes.len(), nodes.len());
        Ok(nodes)
    }

    async fn fetch_neighbors(
        &self,
        node_id: &str,
        edge_type: &str,
        target_label: NodeLabel,
    ) -> Result<Vec<Neighbor>, StoreError> {
        let params = serde_json::json!({
            "node_id": node_id,
            "edge_type": edge_type,
            "target_label": target_label.as_str(),
        });
        let response: NeighborsResponse = self.client.execute_query("getNeighbors", &params).await?;

        Ok(parse_neighbor_records(node_id, edge_type, &response.neighbors))
    }
}
