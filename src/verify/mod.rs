//! Human verification session.
//!
//! A [`VerificationSession`] walks a reviewer through a record list with an
//! explicit, bounds-checked cursor. Verdicts are keyed by problem id, so
//! revisiting a problem overwrites its earlier verdict rather than
//! double-counting it. Scores here are integers on the 1-5 scale, distinct
//! from the pipeline's automatic 0.0-1.0 evaluations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::records::{HumanVerdict, ProblemRecord, VerdictStatus};

/// Lowest valid verdict score.
pub const SCORE_MIN: u8 = 1;
/// Highest valid verdict score.
pub const SCORE_MAX: u8 = 5;

#[derive(Debug, Error)]
pub enum VerdictError {
    #[error("score for '{field}' is {value}, must be {SCORE_MIN}-{SCORE_MAX}")]
    ScoreOutOfRange { field: &'static str, value: u8 },
}

/// Validate a verdict's scores against the 1-5 scale.
pub fn check_verdict(verdict: &HumanVerdict) -> Result<(), VerdictError> {
    let fields = [
        ("correctness", verdict.correctness),
        ("clarity", verdict.clarity),
        ("difficulty_match", verdict.difficulty_match),
        ("completeness", verdict.completeness),
    ];
    for (field, value) in fields {
        if !(SCORE_MIN..=SCORE_MAX).contains(&value) {
            return Err(VerdictError::ScoreOutOfRange { field, value });
        }
    }
    Ok(())
}

/// Aggregate view over the verdicts recorded so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub total: usize,
    pub verified: usize,
    pub approved: usize,
    pub rejected: usize,
    pub needs_revision: usize,
    pub mean_correctness: f64,
    pub mean_clarity: f64,
    pub mean_difficulty_match: f64,
    pub mean_completeness: f64,
}

pub struct VerificationSession {
    problems: Vec<ProblemRecord>,
    cursor: usize,
    verdicts: BTreeMap<String, HumanVerdict>,
}

impl VerificationSession {
    pub fn new(problems: Vec<ProblemRecord>) -> Self {
        Self {
            problems,
            cursor: 0,
            verdicts: BTreeMap::new(),
        }
    }

    /// The record under the cursor, `None` once the end is reached.
    pub fn current(&self) -> Option<&ProblemRecord> {
        self.problems.get(self.cursor)
    }

    /// Move forward one record. Saturates at one past the last record, the
    /// "session finished" position.
    pub fn advance(&mut self) {
        if self.cursor < self.problems.len() {
            self.cursor += 1;
        }
    }

    /// Move back one record. Saturates at the first record.
    pub fn retreat(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// Record a verdict for the current problem and advance. Re-submitting
    /// for a problem replaces its earlier verdict.
    pub fn submit(&mut self, verdict: HumanVerdict) -> Result<(), VerdictError> {
        check_verdict(&verdict)?;
        if let Some(id) = self.current().map(|problem| problem.id.clone()) {
            self.verdicts.insert(id, verdict);
            self.advance();
        }
        Ok(())
    }

    /// Skip the current problem without recording a verdict.
    pub fn skip(&mut self) {
        self.advance();
    }

    /// (verified so far, total problems).
    pub fn progress(&self) -> (usize, usize) {
        (self.verdicts.len(), self.problems.len())
    }

    pub fn is_done(&self) -> bool {
        self.cursor >= self.problems.len()
    }

    pub fn verdicts(&self) -> &BTreeMap<String, HumanVerdict> {
        &self.verdicts
    }

    pub fn summary(&self) -> VerificationSummary {
        let verified = self.verdicts.len();
        let mut approved = 0;
        let mut rejected = 0;
        let mut needs_revision = 0;
        let mut sums = [0u32; 4];

        for verdict in self.verdicts.values() {
            match verdict.status {
                VerdictStatus::Approved => approved += 1,
                VerdictStatus::Rejected => rejected += 1,
                VerdictStatus::NeedsRevision => needs_revision += 1,
            }
            sums[0] += u32::from(verdict.correctness);
            sums[1] += u32::from(verdict.clarity);
            sums[2] += u32::from(verdict.difficulty_match);
            sums[3] += u32::from(verdict.completeness);
        }

        let mean = |sum: u32| {
            if verified == 0 {
                0.0
            } else {
                f64::from(sum) / verified as f64
            }
        };

        VerificationSummary {
            total: self.problems.len(),
            verified,
            approved,
            rejected,
            needs_revision,
            mean_correctness: mean(sums[0]),
            mean_clarity: mean(sums[1]),
            mean_difficulty_match: mean(sums[2]),
            mean_completeness: mean(sums[3]),
        }
    }
}
