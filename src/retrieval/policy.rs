use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::error::{CitegraphError, Result};
use crate::graph::NodeLabel;


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionRule {
    pub edge_type: String,
    pub target_label: NodeLabel,
    pub max_depth: u32,
}

impl ExpansionRule {
    pub fn new(edge_type: impl Into<String>, target_label: NodeLabel, max_depth: u32) -> Self {
        Self {
            edge_type: edge_type.into(),
            target_label,
            max_depth,
        }
    }

    /// A rule may be followed from a node at `depth` only while `depth + 1 <= max_depth`.
    pub fn applies_at(&self, depth: u32) -> bool {
        depth < self.max_depth
    }
}


/// Per-label expansion rules. Labels without an entry are terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionPolicy {
    #[serde(default)]
    rules: HashMap<NodeLabel, Vec<ExpansionRule>>,
}

impl ExpansionPolicy {
    pub fn empty() -> Self {
        Self { rules: HashMap::new() }
    }

    /// Routing, ownership and dependency rules used for work intake.
    pub fn enterprise_default() -> Self {
        Self::empty()
            .with_rules(
                NodeLabel::Issue,
                vec![
                    ExpansionRule::new("BELONGS_TO", NodeLabel::Component, 1),
                    ExpansionRule::new("OWNED_BY", NodeLabel::Owner, 1),
                    ExpansionRule::new("DEPENDS_ON", NodeLabel::Issue, 2),
                ],
            )
            .with_rules(
                NodeLabel::Component,
                vec![
                    ExpansionRule::new("DEPENDS_ON", NodeLabel::Component, 2),
                    ExpansionRule::new("OWNED_BY", NodeLabel::Owner, 1),
                ],
            )
            .with_rules(
                NodeLabel::Owner,
                vec![ExpansionRule::new("MAINTAINS", NodeLabel::CodeModule, 1)],
            )
    }

    pub fn with_rules(mut self, label: NodeLabel, rules: Vec<ExpansionRule>) -> Self {
        self.rules.insert(label, rules);
        self
    }

    pub fn rules_for(&self, label: NodeLabel) -> &[ExpansionRule] {
        self.rules.get(&label).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rules for `label` that may be followed from a node at `depth`, in declared order.
    pub fn applicable(&self, label: NodeLabel, depth: u32) -> impl Iterator<Item = &ExpansionRule> + '_ {
        self.rules_for(label).iter().filter(move |r| r.applies_at(depth))
    }

    pub fn validate(&self) -> Result<()> {
        for (label, rules) in &self.rules {
            if let Some(rule) = rules.iter().find(|r| r.max_depth == 0) {
                return Err(CitegraphError::Config(format!(
                    "policy rule {label} -[{}]-> {} has max_depth 0",
                    rule.edge_type, rule.target_label
                )));
            }
            if let Some(rule) = rules.iter().find(|r| r.edge_type.trim().is_empty()) {
                return Err(CitegraphError::Config(format!(
                    "policy rule for {label} targeting {} has an empty edge type",
                    rule.target_label
                )));
            }
        }
        Ok(())
    }
}

impl Default for ExpansionPolicy {
    fn default() -> Self {
        Self::enterprise_default()
    }
}
