use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::{GraphEdge, GraphNode, NodeLabel};
use crate::utils::safe_truncate;

pub const EVIDENCE_HEADER: &str = "=== EVIDENCE BLOCKS ===";
pub const RELATIONSHIP_HEADER: &str = "=== RELATIONSHIPS ===";
const UNKNOWN_ENDPOINT: &str = "?";


/// `E<n>` identifier, 1-based, valid only inside one serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CitationId(u32);

impl CitationId {
    pub fn new(index: u32) -> Option<Self> {
        (index > 0).then_some(Self(index))
    }

    pub fn index(&self) -> u32 {
        self.0
    }

    /// Bracketed form as it appears in text, e.g. `[E3]`.
    pub fn token(&self) -> String {
        format!("[{self}]")
    }
}

impl fmt::Display for CitationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

impl From<CitationId> for String {
    fn from(id: CitationId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for CitationId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value
            .strip_prefix('E')
            .filter(|digits| !digits.starts_with('0'))
            .and_then(|digits| digits.parse::<u32>().ok())
            .and_then(CitationId::new)
            .ok_or_else(|| format!("invalid citation id: {value}"))
    }
}


/// Citation identifiers emitted for one query, in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CitationId>", into = "Vec<CitationId>")]
pub struct ValidIdSet {
    ordered: Vec<CitationId>,
    tokens: HashSet<String>,
}

impl ValidIdSet {
    pub fn contains_token(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    pub fn ids(&self) -> &[CitationId] {
        &self.ordered
    }

    pub fn tokens(&self) -> impl Iterator<Item = String> + '_ {
        self.ordered.iter().map(CitationId::token)
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

impl From<Vec<CitationId>> for ValidIdSet {
    fn from(ordered: Vec<CitationId>) -> Self {
        let tokens = ordered.iter().map(CitationId::token).collect();
        Self { ordered, tokens }
    }
}

impl From<ValidIdSet> for Vec<CitationId> {
    fn from(set: ValidIdSet) -> Self {
        set.ordered
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceEntry {
    pub citation: CitationId,
    pub node_id: String,
    pub label: NodeLabel,
    pub text: String,
}


#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBlock {
    pub entries: Vec<EvidenceEntry>,
    pub relationships: Vec<String>,
    pub context: String,
    pub valid_ids: ValidIdSet,
}

impl EvidenceBlock {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn citation_for(&self, node_id: &str) -> Option<CitationId> {
        self.entries.iter().find(|e| e.node_id == node_id).map(|e| e.citation)
    }
}


/// Assigns `E1..En` in list order and renders the evidence and relationship blocks.
pub fn serialize_evidence(nodes: &[GraphNode], edges: &[GraphEdge], text_limit: usize) -> EvidenceBlock {
    let mut id_map: HashMap<&str, CitationId> = HashMap::with_capacity(nodes.len());
    let mut entries = Vec::with_capacity(nodes.len());

    for (node, index) in nodes.iter().zip(1u32..) {
        let citation = CitationId(index);
        id_map.insert(node.id.as_str(), citation);
        entries.push(EvidenceEntry {
            citation,
            node_id: node.id.clone(),
            label: node.label,
            text: safe_truncate(&node.text, text_limit),
        });
    }

    let endpoint = |id: &str| {
        id_map
            .get(id)
            .map(CitationId::token)
            .unwrap_or_else(|| UNKNOWN_ENDPOINT.to_string())
    };
    let relationships: Vec<String> = edges
        .iter()
        .map(|e| format!("{} --[{}]--> {}", endpoint(&e.source), e.edge_type, endpoint(&e.target)))
        .collect();

    let blocks: Vec<String> = entries
        .iter()
        .map(|e| format!("{} {}: {}", e.citation.token(), e.label, e.text))
        .collect();

    let context = format!(
        "{EVIDENCE_HEADER}\n{}\n\n{RELATIONSHIP_HEADER}\n{}",
        blocks.join("\n"),
        relationships.join("\n")
    );
    let valid_ids = ValidIdSet::from(entries.iter().map(|e| e.citation).collect::<Vec<_>>());

    EvidenceBlock {
        entries,
        relationships,
        context,
        valid_ids,
    }
}


/// Graph-only rendering: node texts joined by blank lines, no identifiers.
pub fn flatten_evidence(nodes: &[GraphNode], text_limit: usize) -> String {
    nodes
        .iter()
        .map(|n| safe_truncate(&n.text, text_limit))
        .collect::<Vec<_>>()
        .join("\n\n")
}
