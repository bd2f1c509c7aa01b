pub mod agents;
pub mod audit;
pub mod diagnostic; // Per-run prompt/raw dump (MEDASSIST_DUMP_DIR)
pub mod inference;
pub mod orchestrator;
pub mod retrieval;
pub mod sanitize;
pub mod validation;
