use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::evidence::ValidIdSet;

lazy_static! {
    static ref CITATION_TOKEN: Regex = Regex::new(r"\[E\d+\]").expect("citation pattern is valid");
}


/// Citation tokens found in `text`, deduplicated, in order of first appearance.
pub fn extract_citations(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    CITATION_TOKEN
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|token| seen.insert(*token))
        .map(str::to_string)
        .collect()
}


#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationCheck {
    pub cited: Vec<String>,
    pub invalid: Vec<String>,
}

impl CitationCheck {
    pub fn is_valid(&self) -> bool {
        self.invalid.is_empty()
    }
}


/// Compares the cited tokens against the identifiers emitted for this query.
pub fn verify_citations(answer: &str, valid: &ValidIdSet) -> CitationCheck {
    let cited = extract_citations(answer);
    let invalid = cited
        .iter()
        .filter(|token| !valid.contains_token(token))
        .cloned()
        .collect();
    CitationCheck { cited, invalid }
}
