use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::graph::GraphNode;

pub const DEFAULT_MISSING_EMBEDDING_SCORE: f64 = 0.3;


/// What to do with nodes that were never embedded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MissingEmbeddingPolicy {
    /// Treat the node as weakly plausible with a fixed score.
    Fallback { score: f64 },
    /// Drop the node from scoring and pruning.
    Exclude,
}

impl Default for MissingEmbeddingPolicy {
    fn default() -> Self {
        Self::Fallback {
            score: DEFAULT_MISSING_EMBEDDING_SCORE,
        }
    }
}


pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum()
}


/// L2-normalises `v`; `None` for empty or zero vectors.
pub fn normalize(v: &[f32]) -> Option<Vec<f32>> {
    let norm = dot(v, v).sqrt();
    if v.is_empty() || norm == 0.0 || !norm.is_finite() {
        return None;
    }
    Some(v.iter().map(|x| (f64::from(*x) / norm) as f32).collect())
}


/// Dot product of the normalised vectors.
///
/// `None` when the node embedding is unusable (zero vector or wrong dimension),
/// which callers treat like a missing embedding.
pub fn embedding_similarity(query: &[f32], embedding: &[f32]) -> Option<f64> {
    if query.len() != embedding.len() {
        debug!("Embedding dimension mismatch: query={} node={}", query.len(), embedding.len());
        return None;
    }
    let query = normalize(query)?;
    let embedding = normalize(embedding)?;
    Some(dot(&query, &embedding))
}


/// Similarity of one node to the query under the missing-embedding policy.
///
/// `None` means the node is excluded.
pub fn node_similarity(query: &[f32], node: &GraphNode, policy: MissingEmbeddingPolicy) -> Option<f64> {
    let scored = node.embedding().and_then(|e| embedding_similarity(query, e));
    match (scored, policy) {
        (Some(score), _) => Some(score),
        (None, MissingEmbeddingPolicy::Fallback { score }) => Some(score),
        (None, MissingEmbeddingPolicy::Exclude) => None,
    }
}


/// Scores every candidate, keeping retrieval order.
pub fn score_nodes(query: &[f32], candidates: Vec<GraphNode>, policy: MissingEmbeddingPolicy) -> Vec<GraphNode> {
    candidates
        .into_iter()
        .filter_map(|mut node| {
            let similarity = node_similarity(query, &node, policy)?;
            node.similarity = Some(similarity);
            Some(node)
        })
        .collect()
}


/// Top-`k` nodes by similarity, ties kept in retrieval order.
pub fn select_seeds(
    query: &[f32],
    candidates: Vec<GraphNode>,
    k: usize,
    policy: MissingEmbeddingPolicy,
) -> Vec<GraphNode> {
    let mut scored = score_nodes(query, candidates, policy);
    // sort_by is stable, which keeps ties in retrieval order
    scored.sort_by(|a, b| {
        let sa = a.similarity.unwrap_or(f64::NEG_INFINITY);
        let sb = b.similarity.unwrap_or(f64::NEG_INFINITY);
        sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k.max(1));
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeLabel;

    fn node(id: &str, embedding: Option<Vec<f32>>) -> GraphNode {
        let n = GraphNode::new(id, NodeLabel::Issue, "");
        match embedding {
            Some(e) => n.with_embedding(e),
            None => n,
        }
    }

    #[test]
    fn test_similarity_is_dot_of_normalized_vectors() {
        let sim = embedding_similarity(&[1.0, 0.0], &[3.0, 4.0]).unwrap();
        assert!((sim - 0.6).abs() < 1e-6);
        assert!(embedding_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]).is_none());
        assert!(embedding_similarity(&[1.0, 0.0], &[0.0, 0.0]).is_none());
    }

    #[test]
    fn test_missing_embedding_policies() {
        let bare = node("r:owner:1", None);
        assert_eq!(node_similarity(&[1.0, 0.0], &bare, MissingEmbeddingPolicy::default()), Some(0.3));
        assert_eq!(node_similarity(&[1.0, 0.0], &bare, MissingEmbeddingPolicy::Exclude), None);
    }

    #[test]
    fn test_scoring_is_idempotent() {
        let query = normalize(&[0.2, 0.9, 0.4]).unwrap();
        let candidates = vec![
            node("r:issue:1", Some(vec![0.1, 0.8, 0.3])),
            node("r:issue:2", Some(vec![0.9, 0.1, 0.0])),
            node("r:issue:3", None),
        ];
        let first = score_nodes(&query, candidates.clone(), MissingEmbeddingPolicy::default());
        let second = score_nodes(&query, candidates, MissingEmbeddingPolicy::default());
        let a: Vec<Option<f64>> = first.iter().map(|n| n.similarity).collect();
        let b: Vec<Option<f64>> = second.iter().map(|n| n.similarity).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_select_seeds_orders_and_breaks_ties_by_retrieval_order() {
        let candidates = vec![
            node("r:issue:low", Some(vec![0.0, 1.0])),
            node("r:issue:tie-a", Some(vec![1.0, 1.0])),
            node("r:issue:top", Some(vec![1.0, 0.0])),
            node("r:issue:tie-b", Some(vec![2.0, 2.0])),
        ];
        let seeds = select_seeds(&[1.0, 0.0], candidates, 3, MissingEmbeddingPolicy::default());
        let ids: Vec<&str> = seeds.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["r:issue:top", "r:issue:tie-a", "r:issue:tie-b"]);
    }

    #[test]
    fn test_select_seeds_empty_pool_and_minimum_k() {
        assert!(select_seeds(&[1.0, 0.0], Vec::new(), 5, MissingEmbeddingPolicy::default()).is_empty());

        let candidates = vec![node("a:issue:1", Some(vec![1.0, 0.0])), node("a:issue:2", Some(vec![0.5, 0.5]))];
        assert_eq!(select_seeds(&[1.0, 0.0], candidates, 0, MissingEmbeddingPolicy::default()).len(), 1);
    }
}
