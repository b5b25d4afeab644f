//! mathforge: a four-stage pipeline for forging AIME-style math problem
//! datasets with an LLM agent.
//!
//! The stages are base problem generation, diversification, solution
//! generation, and iterative quality improvement. Each stage reads the
//! previous stage's JSON artifact and writes its own; per-record failures
//! are isolated and flagged rather than aborting a run. The crate also
//! ships dataset metrics and a human verification session controller.

pub mod cli;
pub mod error;
pub mod extract;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod policy;
pub mod prompts;
pub mod records;
pub mod stage;
pub mod stages;
pub mod storage;
pub mod validate;
pub mod verify;

pub use error::LlmError;
pub use extract::ExtractionFailure;
pub use pipeline::{PipelineConfig, PipelineError, PipelineOrchestrator};
pub use validate::ValidationFailure;
