

pub mod evidence;
pub mod pipeline;
pub mod policy;
pub mod prompt;
pub mod pruning;
pub mod repair;
pub mod scoring;
pub mod stage;
pub mod traversal;
pub mod verifier;

pub use evidence::{serialize_evidence, CitationId, EvidenceBlock, EvidenceEntry, ValidIdSet};
pub use pipeline::{ContextMode, GraphRagPipeline, PipelineResult, RetrievedEvidence};
pub use policy::{ExpansionPolicy, ExpansionRule};
pub use pruning::{prune, PrunedGraph};
pub use repair::{verify_and_repair, RepairOutcome};
pub use scoring::{select_seeds, MissingEmbeddingPolicy};
pub use stage::{QueryStage, StageTracker};
pub use traversal::{GraphTraversal, TraversalContext, TraversalOutput, TraversalStats};
pub use verifier::{extract_citations, verify_citations, CitationCheck};
