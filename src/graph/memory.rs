use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::models::{GraphEdge, GraphNode, Neighbor, NodeLabel};
use super::store::{parse_node_records, GraphStore, StoreError};
use crate::core::error::Result;


/// On-disk graph export: raw node records plus typed edges.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<serde_json::Value>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}


/// Snapshot-backed graph store for offline runs and tests.
pub struct InMemoryGraphStore {
    order: RwLock<Vec<String>>,
    nodes: RwLock<HashMap<String, GraphNode>>,
    edges: RwLock<Vec<GraphEdge>>,
    failing: RwLock<HashSet<String>>,
    embedded_fails: AtomicBool,
    latency: Option<Duration>,
    neighbor_calls: AtomicUsize,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self {
            order: RwLock::new(Vec::new()),
            nodes: RwLock::new(HashMap::new()),
            edges: RwLock::new(Vec::new()),
            failing: RwLock::new(HashSet::new()),
            embedded_fails: AtomicBool::new(false),
            latency: None,
            neighbor_calls: AtomicUsize::new(0),
        }
    }

    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        let store = Self::new();
        let total = snapshot.nodes.len();
        for node in parse_node_records(&snapshot.nodes) {
            store.add_node(node);
        }
        for edge in snapshot.edges {
            store.add_edge(edge);
        }
        info!(
            "In-memory graph loaded: {}/{} nodes, {} edges",
            store.node_count(),
            total,
            store.edges.read().len()
        );
        store
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let snapshot: GraphSnapshot = serde_json::from_str(&raw)?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes every neighbor lookup from `node_id` fail.
    pub fn fail_neighbors_of(&self, node_id: impl Into<String>) {
        self.failing.write().insert(node_id.into());
    }

    /// Makes the embedded-node listing fail.
    pub fn fail_embedded_nodes(&self) {
        self.embedded_fails.store(true, Ordering::SeqCst);
    }

    pub fn add_node(&self, node: GraphNode) {
        let mut nodes = self.nodes.write();
        if nodes.insert(node.id.clone(), node.clone()).is_none() {
            self.order.write().push(node.id);
        }
    }

    pub fn add_edge(&self, edge: GraphEdge) {
        self.edges.write().push(edge);
    }

    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn neighbor_calls(&self) -> usize {
        self.neighbor_calls.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn fetch_embedded_nodes(&self) -> std::result::Result<Vec<GraphNode>, StoreError> {
        self.simulate_latency().await;
        if self.embedded_fails.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("embedded node listing failed".to_string()));
        }
        let nodes = self.nodes.read();
        Ok(self
            .order
            .read()
            .iter()
            .filter_map(|id| nodes.get(id))
            .filter(|n| n.embedding().is_some())
            .cloned()
            .collect())
    }

    async fn fetch_neighbors(
        &self,
        node_id: &str,
        edge_type: &str,
        target_label: NodeLabel,
    ) -> std::result::Result<Vec<Neighbor>, StoreError> {
        self.neighbor_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.failing.read().contains(node_id) {
            return Err(StoreError::Unavailable(format!("neighbor lookup failed for {node_id}")));
        }

        let nodes = self.nodes.read();
        let neighbors = self
            .edges
            .read()
            .iter()
            .filter(|e| e.source == node_id && e.edge_type == edge_type)
            .filter_map(|e| match nodes.get(&e.target) {
                Some(target) if target.label == target_label => Some(Neighbor {
                    node: target.clone(),
                    edge_type: e.edge_type.clone(),
                    confidence: e.confidence,
                }),
                Some(_) => None,
                None => {
                    warn!("Edge {} -> {} points at an unknown node", e.source, e.target);
                    None
                }
            })
            .collect();
        Ok(neighbors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_store() -> InMemoryGraphStore {
        let store = InMemoryGraphStore::new();
        store.add_node(GraphNode::new("r:issue:1", NodeLabel::Issue, "login fails").with_embedding(vec![1.0, 0.0]));
        store.add_node(GraphNode::new("r:component:auth", NodeLabel::Component, "auth service"));
        store.add_node(GraphNode::new("r:issue:2", NodeLabel::Issue, "token expiry").with_embedding(vec![0.0, 1.0]));
        store.add_edge(GraphEdge::new("r:issue:1", "r:component:auth", "BELONGS_TO", Some(0.9)));
        store.add_edge(GraphEdge::new("r:issue:1", "r:issue:2", "DEPENDS_ON", None));
        store
    }

    #[tokio::test]
    async fn test_fetch_embedded_nodes_keeps_insertion_order() {
        let store = sample_store();
        let nodes = store.fetch_embedded_nodes().await.unwrap();
        let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["r:issue:1", "r:issue:2"]);
    }

    #[tokio::test]
    async fn test_fetch_neighbors_filters_by_edge_and_label() {
        let store = sample_store();

        let components = store
            .fetch_neighbors("r:issue:1", "BELONGS_TO", NodeLabel::Component)
            .await
            .unwrap();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].node.id, "r:component:auth");
        assert_eq!(components[0].confidence, 0.9);

        let wrong_label = store
            .fetch_neighbors("r:issue:1", "BELONGS_TO", NodeLabel::Owner)
            .await
            .unwrap();
        assert!(wrong_label.is_empty());
        assert_eq!(store.neighbor_calls(), 2);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = sample_store();
        store.fail_neighbors_of("r:issue:1");
        let result = store
            .fetch_neighbors("r:issue:1", "DEPENDS_ON", NodeLabel::Issue)
            .await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[test]
    fn test_from_snapshot_skips_malformed_nodes() {
        let snapshot: GraphSnapshot = serde_json::from_value(json!({
            "nodes": [
                {"id": "r:issue:1", "label": "Issue", "text": "a"},
                {"id": "", "label": "Issue"},
                {"id": "r:ticket:1", "label": "Ticket"}
            ],
            "edges": [{"source": "r:issue:1", "target": "r:issue:1", "type": "DEPENDS_ON"}]
        }))
        .unwrap();
        let store = InMemoryGraphStore::from_snapshot(snapshot);
        assert_eq!(store.node_count(), 1);
    }
}
