//! Fallback policy for stage failures.
//!
//! Every recoverable failure in the pipeline routes through [`decide`],
//! which maps a failure kind and an attempt count to one action:
//!
//! | failure kind  | attempts < max | attempts >= max     |
//! |---------------|----------------|---------------------|
//! | Extraction    | Retry          | Substitute          |
//! | Validation    | Retry          | SkipKeepOriginal    |
//! | Orchestration | SkipKeepOriginal | SkipKeepOriginal  |
//!
//! Substitution fills a missing answer with a uniform draw from
//! [100, 999] (the record is flagged so consumers can detect it) and a
//! missing evaluation with the scale midpoint. Retry counts are explicit
//! and bounded; no failure path loops without a counter.

use rand::{Rng, RngExt};

use crate::records::AutoEvaluation;

/// Lower bound of the fabricated-answer draw.
pub const FABRICATED_ANSWER_MIN: i64 = 100;
/// Upper bound of the fabricated-answer draw.
pub const FABRICATED_ANSWER_MAX: i64 = 999;

/// What went wrong, coarse enough to pick a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The response could not be parsed at all.
    Extraction,
    /// The response parsed but failed schema validation.
    Validation,
    /// A whole-stage strategy failed (e.g. batch diversification).
    Orchestration,
}

/// What the stage should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Re-issue the identical request.
    Retry,
    /// Fill the missing piece with a flagged substitute value.
    Substitute,
    /// Keep the input record unchanged and move on.
    SkipKeepOriginal,
}

/// Pick the next action for a failure on attempt `attempts` of `max_attempts`.
pub fn decide(kind: FailureKind, attempts: u32, max_attempts: u32) -> Action {
    match kind {
        FailureKind::Extraction => {
            if attempts < max_attempts {
                Action::Retry
            } else {
                Action::Substitute
            }
        }
        FailureKind::Validation => {
            if attempts < max_attempts {
                Action::Retry
            } else {
                Action::SkipKeepOriginal
            }
        }
        FailureKind::Orchestration => Action::SkipKeepOriginal,
    }
}

/// Draw a substitute answer, uniform over
/// [[`FABRICATED_ANSWER_MIN`], [`FABRICATED_ANSWER_MAX`]]. Records carrying
/// such an answer must set `fabricated_answer`.
pub fn fabricated_answer<R: Rng + ?Sized>(rng: &mut R) -> i64 {
    rng.random_range(FABRICATED_ANSWER_MIN..=FABRICATED_ANSWER_MAX)
}

/// Quality gate for the improvement loop. Elegance is tracked in the
/// evaluation but does not gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityThresholds {
    pub correctness: f64,
    pub clarity: f64,
    pub completeness: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            correctness: 0.9,
            clarity: 0.8,
            completeness: 0.8,
        }
    }
}

impl QualityThresholds {
    /// Whether an evaluation passes the gate. Thresholds are inclusive.
    pub fn met_by(&self, evaluation: &AutoEvaluation) -> bool {
        evaluation.correctness >= self.correctness
            && evaluation.clarity >= self.clarity
            && evaluation.completeness >= self.completeness
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_extraction_retries_then_substitutes() {
        assert_eq!(decide(FailureKind::Extraction, 0, 2), Action::Retry);
        assert_eq!(decide(FailureKind::Extraction, 1, 2), Action::Retry);
        assert_eq!(decide(FailureKind::Extraction, 2, 2), Action::Substitute);
        assert_eq!(decide(FailureKind::Extraction, 5, 2), Action::Substitute);
    }

    #[test]
    fn test_validation_retries_then_skips() {
        assert_eq!(decide(FailureKind::Validation, 0, 3), Action::Retry);
        assert_eq!(decide(FailureKind::Validation, 3, 3), Action::SkipKeepOriginal);
    }

    #[test]
    fn test_orchestration_always_skips() {
        for attempts in 0..5 {
            assert_eq!(
                decide(FailureKind::Orchestration, attempts, 3),
                Action::SkipKeepOriginal
            );
        }
    }

    #[test]
    fn test_fabricated_answer_stays_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..1000 {
            let answer = fabricated_answer(&mut rng);
            assert!((FABRICATED_ANSWER_MIN..=FABRICATED_ANSWER_MAX).contains(&answer));
        }
    }

    #[test]
    fn test_fabricated_answer_deterministic_per_seed() {
        let mut a = ChaCha8Rng::seed_from_u64(7);
        let mut b = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..20 {
            assert_eq!(fabricated_answer(&mut a), fabricated_answer(&mut b));
        }
    }

    #[test]
    fn test_quality_gate() {
        let thresholds = QualityThresholds::default();

        let passing = AutoEvaluation {
            correctness: 0.9,
            clarity: 0.8,
            completeness: 0.8,
            elegance: 0.0,
        };
        // Boundary equality passes; elegance never gates.
        assert!(thresholds.met_by(&passing));

        let failing = AutoEvaluation {
            correctness: 0.89,
            clarity: 1.0,
            completeness: 1.0,
            elegance: 1.0,
        };
        assert!(!thresholds.met_by(&failing));
    }
}
