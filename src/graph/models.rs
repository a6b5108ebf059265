use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::core::error::CitegraphError;

pub const DEFAULT_EDGE_CONFIDENCE: f64 = 0.5;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(ascii_case_insensitive)]
pub enum NodeLabel {
    Issue,
    Component,
    Owner,
    CodeModule,
    Service,
    DocumentationPage,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

impl Serialize for NodeLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NodeLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NodeLabel::from_str(&raw)
            .map_err(|_| serde::de::Error::custom(format!("unknown node label: {raw}")))
    }
}


/// Read-only snapshot of a node fetched from the graph store for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: NodeLabel,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f64>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, label: NodeLabel, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label,
            text: text.into(),
            embedding: None,
            similarity: None,
            relevance: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = if embedding.is_empty() { None } else { Some(embedding) };
        self
    }

    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref().filter(|e| !e.is_empty())
    }

    /// Repo segment of a `<repo>:<kind>:<local-id>` id.
    pub fn repo(&self) -> Option<&str> {
        let mut parts = self.id.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(repo), Some(_), Some(_)) if !repo.is_empty() => Some(repo),
            _ => None,
        }
    }

    /// Builds a node from a raw store record.
    ///
    /// Accepts `text` or `text_payload` for the payload. A missing id or an
    /// unknown label is reported as `MalformedNode`.
    pub fn from_record(record: &serde_json::Value) -> Result<Self, CitegraphError> {
        let id = record
            .get("id")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| CitegraphError::MalformedNode(format!("missing id in record {record}")))?;

        let raw_label = record
            .get("label")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CitegraphError::MalformedNode(format!("missing label for {id}")))?;
        let label = NodeLabel::from_str(raw_label)
            .map_err(|_| CitegraphError::MalformedNode(format!("unknown label '{raw_label}' for {id}")))?;

        let text = record
            .get("text")
            .or_else(|| record.get("text_payload"))
            .and_then(|v| v.as_str())
            .unwrap_or("");

        let embedding = record
            .get("embedding")
            .and_then(|v| v.as_array())
            .map(|values| {
                values
                    .iter()
                    .filter_map(|x| x.as_f64())
                    .map(|x| x as f32)
                    .collect::<Vec<f32>>()
            })
            .unwrap_or_default();

        let node = GraphNode::new(id, label, text).with_embedding(embedding);
        if node.repo().is_none() {
            tracing::debug!("Node id {} does not follow <repo>:<kind>:<local-id>", node.id);
        }
        Ok(node)
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    DEFAULT_EDGE_CONFIDENCE
}

impl GraphEdge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        edge_type: impl Into<String>,
        confidence: Option<f64>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            edge_type: edge_type.into(),
            confidence: normalize_confidence(confidence),
        }
    }
}

pub fn normalize_confidence(confidence: Option<f64>) -> f64 {
    match confidence {
        Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
        _ => DEFAULT_EDGE_CONFIDENCE,
    }
}


/// One-hop result of a directed neighbor lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub node: GraphNode,
    pub edge_type: String,
    pub confidence: f64,
}
