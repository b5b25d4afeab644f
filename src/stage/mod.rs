//! Stage execution harness.
//!
//! A stage is a list-in, list-out pass over records. [`StageRunner`] owns
//! the invariants every stage shares, so individual stages only implement
//! the per-record work:
//!
//! - input order is preserved and records are processed sequentially,
//!   keeping one agent call in flight at a time;
//! - a per-record failure never aborts the stage: the input record is kept,
//!   flagged by the transform, and annotated with the error text, so
//!   mapping stages always emit as many records as they consume;
//! - expanding stages append their new records after the originals, and a
//!   total expansion failure on non-empty input still yields the originals;
//! - the stage's artifact is written once, after the loop.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::LlmError;
use crate::extract::ExtractionFailure;
use crate::records::ProblemRecord;
use crate::storage::{self, StorageError};
use crate::validate::ValidationFailure;

/// A per-record failure surfaced by a transform. The message is stored in
/// the kept record's `error` field.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StageFailure(pub String);

impl StageFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<LlmError> for StageFailure {
    fn from(err: LlmError) -> Self {
        Self(err.to_string())
    }
}

impl From<ExtractionFailure> for StageFailure {
    fn from(err: ExtractionFailure) -> Self {
        Self(err.to_string())
    }
}

impl From<ValidationFailure> for StageFailure {
    fn from(err: ValidationFailure) -> Self {
        Self(err.to_string())
    }
}

/// One-in-one-out record work (stages 3 and 4).
#[async_trait]
pub trait RecordTransform: Send {
    /// Process one record. On `Err` the runner keeps the input record.
    async fn apply(&mut self, record: ProblemRecord) -> Result<ProblemRecord, StageFailure>;

    /// Mark a kept record so downstream consumers can see the stage did not
    /// complete for it.
    fn flag_failure(&self, record: &mut ProblemRecord);
}

/// Record expansion (stage 2): originals pass through, new records are
/// appended. Expansion handles its own fallbacks and is infallible at this
/// seam; an empty return means no variations could be produced.
#[async_trait]
pub trait RecordExpander: Send {
    async fn expand(&mut self, originals: &[ProblemRecord]) -> Vec<ProblemRecord>;
}

/// Runs one stage over a record list and persists its artifact.
pub struct StageRunner {
    stage_name: String,
    output_path: PathBuf,
}

impl StageRunner {
    pub fn new(stage_name: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            stage_name: stage_name.into(),
            output_path: output_path.into(),
        }
    }

    pub fn output_path(&self) -> &std::path::Path {
        &self.output_path
    }

    /// Run a mapping transform. The output has exactly one record per input
    /// record, in input order.
    pub async fn run_map<T: RecordTransform>(
        &self,
        input: Vec<ProblemRecord>,
        transform: &mut T,
    ) -> Vec<ProblemRecord> {
        let mut output = Vec::with_capacity(input.len());

        for record in input {
            let id = record.id.clone();
            let mut original = record.clone();
            match transform.apply(record).await {
                Ok(processed) => output.push(processed),
                Err(failure) => {
                    warn!(
                        stage = %self.stage_name,
                        record = %id,
                        error = %failure,
                        "Record failed, keeping original"
                    );
                    original.error = Some(failure.to_string());
                    transform.flag_failure(&mut original);
                    output.push(original);
                }
            }
        }

        info!(stage = %self.stage_name, records = output.len(), "Stage complete");
        output
    }

    /// Run an expanding stage: `originals ++ new`. Never returns fewer
    /// records than it was given.
    pub async fn run_additive<E: RecordExpander>(
        &self,
        input: Vec<ProblemRecord>,
        expander: &mut E,
    ) -> Vec<ProblemRecord> {
        let new_records = expander.expand(&input).await;
        if new_records.is_empty() && !input.is_empty() {
            warn!(
                stage = %self.stage_name,
                "Expansion produced nothing, passing originals through"
            );
        }

        let mut output = input;
        output.extend(new_records);
        info!(stage = %self.stage_name, records = output.len(), "Stage complete");
        output
    }

    /// Persist the stage artifact.
    pub fn persist(&self, records: &[ProblemRecord]) -> Result<(), StorageError> {
        storage::write_artifact(&self.output_path, records)
    }
}
