use std::collections::HashSet;

use tracing::info;

use super::scoring::{node_similarity, MissingEmbeddingPolicy};
use crate::graph::{GraphEdge, GraphNode};


#[derive(Debug, Clone, Default)]
pub struct PrunedGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub dropped_nodes: usize,
    pub dropped_edges: usize,
}


/// Keeps nodes whose relevance is at or above `threshold`, then keeps only
/// the edges whose endpoints both survived. Node order is preserved.
pub fn prune(
    query: &[f32],
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    threshold: f64,
    policy: MissingEmbeddingPolicy,
) -> PrunedGraph {
    let total_nodes = nodes.len();
    let total_edges = edges.len();

    let kept: Vec<GraphNode> = nodes
        .into_iter()
        .filter_map(|mut node| {
            let relevance = node_similarity(query, &node, policy)?;
            if relevance < threshold {
                return None;
            }
            node.relevance = Some(relevance);
            Some(node)
        })
        .collect();

    let ids: HashSet<&str> = kept.iter().map(|n| n.id.as_str()).collect();
    let kept_edges: Vec<GraphEdge> = edges
        .into_iter()
        .filter(|e| ids.contains(e.source.as_str()) && ids.contains(e.target.as_str()))
        .collect();

    let pruned = PrunedGraph {
        dropped_nodes: total_nodes - kept.len(),
        dropped_edges: total_edges - kept_edges.len(),
        nodes: kept,
        edges: kept_edges,
    };

    info!(
        "Pruning at {:.2}: {} -> {} nodes, {} -> {} edges",
        threshold,
        total_nodes,
        pruned.nodes.len(),
        total_edges,
        pruned.edges.len()
    );
    pruned
}
