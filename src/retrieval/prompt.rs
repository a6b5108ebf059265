use super::evidence::ValidIdSet;


pub const CITED_SYSTEM_PROMPT: &str = "You are an expert enterprise planning assistant. \
Cite evidence [E1],[E2] etc for every claim. Only use provided evidence.";

pub const FLAT_SYSTEM_PROMPT: &str = "You are an expert enterprise planning assistant.";


pub fn build_cited_prompt(context: &str, query: &str) -> String {
    format!(
        r#"{context}

=== REQUEST ===
{query}

=== OUTPUT ===
1. TAXONOMY CLASSIFICATION (cite evidence)
2. ROUTING/OWNERSHIP (cite evidence)
3. DEPENDENCIES (cite evidence)
4. CLARIFICATION QUESTIONS
5. ACCEPTANCE CRITERIA"#
    )
}


pub fn build_flat_prompt(context: &str, query: &str) -> String {
    format!(
        "Context:\n{context}\n\nRequest:\n{query}\n\n\
         Provide: 1) Taxonomy 2) Routing 3) Dependencies 4) Questions 5) Criteria"
    )
}


/// Corrective request naming the invalid tokens and the full valid set.
pub fn build_repair_prompt(invalid: &[String], valid: &ValidIdSet, context: &str, answer: &str) -> String {
    let valid_tokens = valid.tokens().collect::<Vec<_>>().join(", ");
    let valid_tokens = if valid_tokens.is_empty() {
        "(none)".to_string()
    } else {
        valid_tokens
    };

    format!(
        "Your response cited non-existent evidence: {}. Valid IDs: {}. \
         Revise, removing invalid citations.\n\n\
         Original context:\n{context}\n\n\
         Your response:\n{answer}",
        invalid.join(", "),
        valid_tokens
    )
}
