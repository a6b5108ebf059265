use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::policy::ExpansionPolicy;
use crate::graph::{GraphEdge, GraphNode, GraphStore, StoreError};


#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalStats {
    pub seeds: usize,
    pub nodes_visited: usize,
    pub edges_recorded: usize,
    pub store_calls: usize,
    pub failed_fetches: usize,
    pub deepest_hop: u32,
}


#[derive(Debug, Clone, Default)]
pub struct TraversalOutput {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub stats: TraversalStats,
}


/// Caller-owned state of one breadth-first expansion.
///
/// A node is visited at most once; the first depth it is reached at is kept.
#[derive(Debug, Default)]
pub struct TraversalContext {
    visited: HashSet<String>,
    frontier: VecDeque<(GraphNode, u32)>,
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    stats: TraversalStats,
}

impl TraversalContext {
    pub fn new(seeds: Vec<GraphNode>) -> Self {
        let mut ctx = Self::default();
        ctx.stats.seeds = seeds.len();
        ctx.frontier.extend(seeds.into_iter().map(|s| (s, 0)));
        ctx
    }

    /// Pops the next unvisited frontier entry within `max_hops` and marks it visited.
    fn next_entry(&mut self, max_hops: u32) -> Option<(GraphNode, u32)> {
        while let Some((node, depth)) = self.frontier.pop_front() {
            if depth > max_hops || self.visited.contains(&node.id) {
                continue;
            }
            self.visited.insert(node.id.clone());
            self.nodes.push(node.clone());
            self.stats.nodes_visited += 1;
            self.stats.deepest_hop = self.stats.deepest_hop.max(depth);
            return Some((node, depth));
        }
        None
    }

    fn record_edge(&mut self, edge: GraphEdge, neighbor: GraphNode, depth: u32) {
        let is_new = !self.visited.contains(&neighbor.id);
        self.edges.push(edge);
        self.stats.edges_recorded += 1;
        if is_new {
            self.frontier.push_back((neighbor, depth));
        }
    }

    pub fn finish(self) -> TraversalOutput {
        TraversalOutput {
            nodes: self.nodes,
            edges: self.edges,
            stats: self.stats,
        }
    }
}


/// Policy-driven multi-source BFS over a graph store.
pub struct GraphTraversal<'a, S: GraphStore + ?Sized> {
    store: &'a S,
    policy: &'a ExpansionPolicy,
    fetch_timeout: Duration,
}

impl<'a, S: GraphStore + ?Sized> GraphTraversal<'a, S> {
    pub fn new(store: &'a S, policy: &'a ExpansionPolicy, fetch_timeout: Duration) -> Self {
        Self {
            store,
            policy,
            fetch_timeout,
        }
    }

    pub async fn expand(&self, seeds: Vec<GraphNode>, max_hops: u32) -> TraversalOutput {
        let mut ctx = TraversalContext::new(seeds);
        self.run(&mut ctx, max_hops).await;
        let output = ctx.finish();
        info!(
            "Traversal: {} seeds -> {} nodes, {} edges ({} failed fetches)",
            output.stats.seeds,
            output.nodes.len(),
            output.edges.len(),
            output.stats.failed_fetches
        );
        output
    }

    /// Drains the frontier of `ctx`.
    ///
    /// A failed or timed-out neighbor fetch abandons the remaining rules of
    /// that node only; everything discovered so far is kept.
    pub async fn run(&self, ctx: &mut TraversalContext, max_hops: u32) {
        while let Some((current, depth)) = ctx.next_entry(max_hops) {
            for rule in self.policy.applicable(current.label, depth) {
                ctx.stats.store_calls += 1;
                let neighbors = match self.fetch(&current.id, rule.edge_type.as_str(), rule.target_label).await {
                    Ok(neighbors) => neighbors,
                    Err(e) => {
                        ctx.stats.failed_fetches += 1;
                        warn!(
                            "Abandoning expansion of {} at rule {}: {}",
                            current.id, rule.edge_type, e
                        );
                        break;
                    }
                };

                debug!(
                    "{} -[{}]-> {}: {} neighbors",
                    current.id,
                    rule.edge_type,
                    rule.target_label,
                    neighbors.len()
                );

                for neighbor in neighbors {
                    let edge = GraphEdge::new(
                        current.id.clone(),
                        neighbor.node.id.clone(),
                        neighbor.edge_type,
                        Some(neighbor.confidence),
                    );
                    ctx.record_edge(edge, neighbor.node, depth + 1);
                }
            }
        }
    }

    async fn fetch(
        &self,
        node_id: &str,
        edge_type: &str,
        target_label: crate::graph::NodeLabel,
    ) -> Result<Vec<crate::graph::Neighbor>, StoreError> {
        match tokio::time::timeout(
            self.fetch_timeout,
            self.store.fetch_neighbors(node_id, edge_type, target_label),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                query: format!("fetch_neighbors({node_id}, {edge_type})"),
                timeout_ms: self.fetch_timeout.as_millis() as u64,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{InMemoryGraphStore, NodeLabel};
    use crate::retrieval::policy::ExpansionRule;

    fn issue(id: &str) -> GraphNode {
        GraphNode::new(id, NodeLabel::Issue, format!("issue {id}"))
    }

    fn chain_store() -> InMemoryGraphStore {
        let store = InMemoryGraphStore::new();
        for id in ["A", "B", "C", "D"] {
            store.add_node(issue(id));
        }
        store.add_edge(GraphEdge::new("A", "B", "DEPENDS_ON", None));
        store.add_edge(GraphEdge::new("B", "C", "DEPENDS_ON", None));
        store.add_edge(GraphEdge::new("C", "D", "DEPENDS_ON", None));
        store
    }

    fn depends_policy(max_depth: u32) -> ExpansionPolicy {
        ExpansionPolicy::empty().with_rules(
            NodeLabel::Issue,
            vec![ExpansionRule::new("DEPENDS_ON", NodeLabel::Issue, max_depth)],
        )
    }

    fn ids(nodes: &[GraphNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_label_without_rules_is_terminal() {
        let store = chain_store();
        let policy = ExpansionPolicy::empty();
        let seed = issue("r:issue:1").with_embedding(vec![1.0, 0.0]);

        let out = GraphTraversal::new(&store, &policy, Duration::from_secs(1))
            .expand(vec![seed], 3)
            .await;
        assert_eq!(ids(&out.nodes), vec!["r:issue:1"]);
        assert!(out.edges.is_empty());
        assert_eq!(store.neighbor_calls(), 0);
    }

    #[tokio::test]
    async fn test_policy_depth_limits_chain() {
        let store = chain_store();
        let policy = depends_policy(2);

        let out = GraphTraversal::new(&store, &policy, Duration::from_secs(1))
            .expand(vec![issue("A")], 3)
            .await;
        assert_eq!(ids(&out.nodes), vec!["A", "B", "C"]);
        let edges: Vec<(&str, &str)> = out
            .edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str()))
            .collect();
        assert_eq!(edges, vec![("A", "B"), ("B", "C")]);
        assert_eq!(out.stats.deepest_hop, 2);
    }

    #[tokio::test]
    async fn test_max_hops_bounds_depth() {
        let store = chain_store();
        let policy = depends_policy(10);

        let out = GraphTraversal::new(&store, &policy, Duration::from_secs(1))
            .expand(vec![issue("A")], 1)
            .await;
        assert_eq!(ids(&out.nodes), vec!["A", "B"]);
        assert!(out.stats.deepest_hop <= 1);
    }

    #[tokio::test]
    async fn test_nodes_visited_once_with_multiple_seeds_and_cycles() {
        let store = chain_store();
        store.add_edge(GraphEdge::new("C", "A", "DEPENDS_ON", None));
        store.add_edge(GraphEdge::new("A", "C", "DEPENDS_ON", None));
        let policy = depends_policy(5);

        let out = GraphTraversal::new(&store, &policy, Duration::from_secs(1))
            .expand(vec![issue("A"), issue("C"), issue("A")], 5)
            .await;

        let mut seen = HashSet::new();
        for node in &out.nodes {
            assert!(seen.insert(node.id.clone()), "{} visited twice", node.id);
        }
        assert_eq!(ids(&out.nodes), vec!["A", "C", "B", "D"]);
        // edges into already-visited nodes are still recorded
        assert!(out.edges.iter().any(|e| e.source == "C" && e.target == "A"));
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_partial_results() {
        let store = chain_store();
        store.add_node(GraphNode::new("comp", NodeLabel::Component, "payments"));
        store.add_edge(GraphEdge::new("B", "comp", "BELONGS_TO", Some(0.8)));
        store.fail_neighbors_of("B");

        let policy = ExpansionPolicy::empty().with_rules(
            NodeLabel::Issue,
            vec![
                ExpansionRule::new("DEPENDS_ON", NodeLabel::Issue, 3),
                ExpansionRule::new("BELONGS_TO", NodeLabel::Component, 3),
            ],
        );

        let out = GraphTraversal::new(&store, &policy, Duration::from_secs(1))
            .expand(vec![issue("A")], 3)
            .await;
        assert_eq!(ids(&out.nodes), vec!["A", "B"]);
        assert_eq!(out.stats.failed_fetches, 1);
        assert_eq!(out.edges.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_not_fatal() {
        let store = chain_store().with_latency(Duration::from_millis(200));
        let policy = depends_policy(2);

        let out = GraphTraversal::new(&store, &policy, Duration::from_millis(10))
            .expand(vec![issue("A")], 3)
            .await;
        assert_eq!(ids(&out.nodes), vec!["A"]);
        assert_eq!(out.stats.failed_fetches, 1);
    }

    #[tokio::test]
    async fn test_empty_seed_set() {
        let store = chain_store();
        let policy = depends_policy(2);
        let out = GraphTraversal::new(&store, &policy, Duration::from_secs(1))
            .expand(Vec::new(), 3)
            .await;
        assert!(out.nodes.is_empty());
        assert!(out.edges.is_empty());
    }
}
