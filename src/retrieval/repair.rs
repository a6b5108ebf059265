use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::evidence::EvidenceBlock;
use super::prompt::build_repair_prompt;
use super::verifier::{verify_citations, CitationCheck};
use crate::core::error::{CitegraphError, GenerationCall, Result};
use crate::llm::providers::{generate_with_timeout, LlmMetadata, LlmProvider};


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairOutcome {
    pub answer: String,
    /// Check of the first answer, before any repair.
    pub initial_check: CitationCheck,
    pub was_regenerated: bool,
    pub attempts: u32,
    pub generations: Vec<LlmMetadata>,
}


/// Verifies `answer` against the evidence and issues corrective regenerations.
///
/// With `max_attempts == 1` exactly one repair is sent when any citation is
/// invalid, and its result is accepted without re-checking. Larger budgets
/// re-check between attempts and stop once the citations are valid.
pub async fn verify_and_repair<G: LlmProvider + ?Sized>(
    generator: &G,
    answer: String,
    evidence: &EvidenceBlock,
    max_attempts: u32,
    timeout: Duration,
) -> Result<RepairOutcome> {
    let initial_check = verify_citations(&answer, &evidence.valid_ids);
    let mut invalid = initial_check.invalid.clone();
    let mut answer = answer;
    let mut attempts = 0;
    let mut generations = Vec::new();

    if !invalid.is_empty() && max_attempts == 0 {
        warn!("Answer cites unknown evidence {:?}; repair disabled", invalid);
    }

    while !invalid.is_empty() && attempts < max_attempts {
        info!(
            "Repair pass {}/{}: invalid citations {}",
            attempts + 1,
            max_attempts,
            invalid.join(", ")
        );

        let prompt = build_repair_prompt(&invalid, &evidence.valid_ids, &evidence.context, &answer);
        let mut generation = generate_with_timeout(generator, &prompt, None, timeout)
            .await
            .map_err(|e| CitegraphError::generation(GenerationCall::Repair, evidence.context.clone(), e))?;

        generation.metadata.purpose = Some("citation_fix".to_string());
        generations.push(generation.metadata);
        answer = generation.text;
        attempts += 1;

        if attempts >= max_attempts {
            break;
        }
        invalid = verify_citations(&answer, &evidence.valid_ids).invalid;
    }

    Ok(RepairOutcome {
        answer,
        initial_check,
        was_regenerated: attempts > 0,
        attempts,
        generations,
    })
}
