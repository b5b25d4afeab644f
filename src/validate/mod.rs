//! Schema validation of extracted JSON values.
//!
//! The extractor guarantees only syntactic JSON; this module checks fields
//! and ranges and produces typed records. Strictness varies by record kind:
//! problems gate hard (a malformed problem is regenerated upstream),
//! solutions are lenient (steps may be sparse), and evaluations are
//! advisory (missing scores fall back to the scale midpoint rather than
//! failing the record).

use serde_json::Value;
use thiserror::Error;

use crate::records::{
    AutoEvaluation, ProblemRecord, SolutionMethod, SolutionRecord, StepRecord, Topic, ANSWER_MAX,
    ANSWER_MIN,
};

/// Minimum problem statement length, in characters.
pub const MIN_PROBLEM_LEN: usize = 20;

/// A parsed value that does not satisfy the record schema. Variants name
/// the offending field so callers can match programmatically.
#[derive(Debug, Error)]
pub enum ValidationFailure {
    #[error("expected a JSON object for {0}, got something else")]
    NotAnObject(&'static str),
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("field 'answer' must be an integer, got {0}")]
    AnswerNotInteger(String),
    #[error("answer {0} outside valid range [{ANSWER_MIN}, {ANSWER_MAX}]")]
    AnswerOutOfRange(i64),
    #[error("problem statement too short ({0} chars, minimum {MIN_PROBLEM_LEN})")]
    ProblemTooShort(usize),
    #[error("field 'steps' must be a sequence, got {0}")]
    StepsNotASequence(String),
}

impl ValidationFailure {
    /// The field the failure is about.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationFailure::NotAnObject(_) => "<root>",
            ValidationFailure::MissingField(field) => field,
            ValidationFailure::AnswerNotInteger(_) => "answer",
            ValidationFailure::AnswerOutOfRange(_) => "answer",
            ValidationFailure::ProblemTooShort(_) => "problem",
            ValidationFailure::StepsNotASequence(_) => "steps",
        }
    }
}

/// A problem payload that passed validation but has no pipeline identity
/// yet. The stage assigns the id and stage tags via [`into_record`].
///
/// [`into_record`]: ValidatedProblem::into_record
#[derive(Debug, Clone)]
pub struct ValidatedProblem {
    pub problem: String,
    pub answer: i64,
    pub topic: Topic,
    pub difficulty: i64,
    pub tags: Vec<String>,
}

impl ValidatedProblem {
    pub fn into_record(self, id: impl Into<String>) -> ProblemRecord {
        ProblemRecord::new(id, self.problem, self.answer, self.topic, self.difficulty)
            .with_tags(self.tags)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Validate an extracted problem payload.
///
/// Requires `problem`, `answer`, `topic`, `difficulty`. The answer must be
/// an integer (floats and numeric strings are rejected, not coerced) inside
/// `[ANSWER_MIN, ANSWER_MAX]`; boundaries are accepted, out-of-range values
/// are rejected rather than clamped. The statement must be at least
/// [`MIN_PROBLEM_LEN`] characters.
pub fn validate_problem(value: &Value) -> Result<ValidatedProblem, ValidationFailure> {
    let obj = value
        .as_object()
        .ok_or(ValidationFailure::NotAnObject("problem"))?;

    let problem = obj
        .get("problem")
        .and_then(Value::as_str)
        .ok_or(ValidationFailure::MissingField("problem"))?;

    let answer_value = obj
        .get("answer")
        .ok_or(ValidationFailure::MissingField("answer"))?;
    let answer = answer_value
        .as_i64()
        .ok_or_else(|| ValidationFailure::AnswerNotInteger(answer_value.to_string()))?;
    if !(ANSWER_MIN..=ANSWER_MAX).contains(&answer) {
        return Err(ValidationFailure::AnswerOutOfRange(answer));
    }

    let topic = obj
        .get("topic")
        .and_then(Value::as_str)
        .ok_or(ValidationFailure::MissingField("topic"))?;

    let difficulty = obj
        .get("difficulty")
        .and_then(Value::as_i64)
        .ok_or(ValidationFailure::MissingField("difficulty"))?;

    let len = problem.chars().count();
    if len < MIN_PROBLEM_LEN {
        return Err(ValidationFailure::ProblemTooShort(len));
    }

    let tags = obj
        .get("tags")
        .and_then(Value::as_array)
        .map(|array| {
            array
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(ValidatedProblem {
        problem: problem.to_string(),
        answer,
        topic: Topic::parse(topic),
        difficulty,
        tags,
    })
}

/// Validate an extracted solution payload.
///
/// `steps` must be present and a sequence (empty is tolerated);
/// `final_answer` must be present but may be any JSON type. Malformed step
/// entries are repaired rather than rejected: a missing step number gets its
/// 1-based position, missing text fields default to empty.
pub fn validate_solution(
    value: &Value,
    method: SolutionMethod,
) -> Result<SolutionRecord, ValidationFailure> {
    let obj = value
        .as_object()
        .ok_or(ValidationFailure::NotAnObject("solution"))?;

    let steps_value = obj
        .get("steps")
        .ok_or(ValidationFailure::MissingField("steps"))?;
    let raw_steps = steps_value
        .as_array()
        .ok_or_else(|| ValidationFailure::StepsNotASequence(type_name(steps_value).to_string()))?;

    let final_answer = obj
        .get("final_answer")
        .ok_or(ValidationFailure::MissingField("final_answer"))?
        .clone();

    let steps = raw_steps
        .iter()
        .enumerate()
        .map(|(i, entry)| StepRecord {
            step: entry
                .get("step")
                .and_then(Value::as_u64)
                .map(|n| n as u32)
                .unwrap_or((i + 1) as u32),
            description: entry
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            result: entry
                .get("result")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
        .collect();

    Ok(SolutionRecord {
        method,
        steps,
        final_answer,
        verified: false,
        error: None,
    })
}

/// Validate an extracted evaluation payload. Infallible: each score is
/// clamped into [0.0, 1.0], missing or non-numeric scores fall back to the
/// scale midpoint.
pub fn validate_auto_evaluation(value: &Value) -> AutoEvaluation {
    let score_field = |name: &str| -> f64 {
        value
            .get(name)
            .and_then(Value::as_f64)
            .map(|score| score.clamp(0.0, 1.0))
            .unwrap_or(AutoEvaluation::MIDPOINT)
    };

    AutoEvaluation {
        correctness: score_field("correctness"),
        clarity: score_field("clarity"),
        completeness: score_field("completeness"),
        elegance: score_field("elegance"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn problem_value(answer: Value) -> Value {
        json!({
            "problem": "Find the remainder when 2^100 is divided by 1000",
            "answer": answer,
            "topic": "Number Theory",
            "difficulty": 7,
        })
    }

    #[test]
    fn test_valid_problem() {
        let validated = validate_problem(&problem_value(json!(376))).expect("validate");
        assert_eq!(validated.answer, 376);
        assert_eq!(validated.topic, Topic::NumberTheory);

        let record = validated.into_record("gen_0");
        assert_eq!(record.id, "gen_0");
        assert_eq!(record.difficulty, 7);
    }

    #[test]
    fn test_answer_boundaries_accepted() {
        assert!(validate_problem(&problem_value(json!(0))).is_ok());
        assert!(validate_problem(&problem_value(json!(999))).is_ok());
    }

    #[test]
    fn test_answer_out_of_range_rejected_not_clamped() {
        let err = validate_problem(&problem_value(json!(1000))).expect_err("reject");
        assert!(matches!(err, ValidationFailure::AnswerOutOfRange(1000)));
        let err = validate_problem(&problem_value(json!(-1))).expect_err("reject");
        assert!(matches!(err, ValidationFailure::AnswerOutOfRange(-1)));
    }

    #[test]
    fn test_non_integer_answer_rejected() {
        let err = validate_problem(&problem_value(json!(3.5))).expect_err("reject float");
        assert!(matches!(err, ValidationFailure::AnswerNotInteger(_)));
        let err = validate_problem(&problem_value(json!("42"))).expect_err("reject string");
        assert!(matches!(err, ValidationFailure::AnswerNotInteger(_)));
        assert_eq!(err.field(), "answer");
    }

    #[test]
    fn test_missing_field_is_named() {
        let mut value = problem_value(json!(5));
        value.as_object_mut().expect("object").remove("topic");
        let err = validate_problem(&value).expect_err("reject");
        assert!(matches!(err, ValidationFailure::MissingField("topic")));
    }

    #[test]
    fn test_too_short_problem_rejected() {
        let value = json!({
            "problem": "short",
            "answer": 5,
            "topic": "Algebra",
            "difficulty": 6,
        });
        let err = validate_problem(&value).expect_err("reject");
        assert!(matches!(err, ValidationFailure::ProblemTooShort(5)));
    }

    #[test]
    fn test_non_object_rejected() {
        let err = validate_problem(&json!([1, 2, 3])).expect_err("reject");
        assert!(matches!(err, ValidationFailure::NotAnObject("problem")));
    }

    #[test]
    fn test_valid_solution_tolerates_step_gaps() {
        let value = json!({
            "steps": [
                {"step": 1, "description": "factor", "result": "x(x+1)"},
                {"step": 3, "description": "substitute", "result": "12"},
            ],
            "final_answer": 12,
        });
        let solution = validate_solution(&value, SolutionMethod::CotMcts).expect("validate");
        assert_eq!(solution.steps.len(), 2);
        assert_eq!(solution.steps[1].step, 3);
        assert_eq!(solution.final_answer_i64(), Some(12));
        assert!(!solution.verified);
    }

    #[test]
    fn test_empty_steps_tolerated() {
        let value = json!({"steps": [], "final_answer": 7});
        let solution = validate_solution(&value, SolutionMethod::Direct).expect("validate");
        assert!(solution.steps.is_empty());
    }

    #[test]
    fn test_final_answer_any_type_tolerated() {
        let value = json!({"steps": [], "final_answer": "2\\sqrt{3}"});
        let solution = validate_solution(&value, SolutionMethod::Direct).expect("validate");
        assert_eq!(solution.final_answer_i64(), None);
        assert!(solution.final_answer.is_string());
    }

    #[test]
    fn test_steps_must_be_a_sequence() {
        let value = json!({"steps": "first do this", "final_answer": 1});
        let err = validate_solution(&value, SolutionMethod::Direct).expect_err("reject");
        assert!(matches!(err, ValidationFailure::StepsNotASequence(_)));
    }

    #[test]
    fn test_missing_step_numbers_filled_positionally() {
        let value = json!({
            "steps": [{"description": "only text"}, {"description": "more text"}],
            "final_answer": 0,
        });
        let solution = validate_solution(&value, SolutionMethod::Direct).expect("validate");
        assert_eq!(solution.steps[0].step, 1);
        assert_eq!(solution.steps[1].step, 2);
        assert_eq!(solution.steps[0].result, "");
    }

    #[test]
    fn test_evaluation_scores_clamped() {
        let value = json!({
            "correctness": 1.7,
            "clarity": -0.3,
            "completeness": 0.85,
            "elegance": 0.6,
        });
        let eval = validate_auto_evaluation(&value);
        assert!((eval.correctness - 1.0).abs() < f64::EPSILON);
        assert!((eval.clarity - 0.0).abs() < f64::EPSILON);
        assert!((eval.completeness - 0.85).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_evaluation_fields_default_to_midpoint() {
        let eval = validate_auto_evaluation(&json!({"correctness": 0.9}));
        assert!((eval.correctness - 0.9).abs() < f64::EPSILON);
        assert!((eval.clarity - AutoEvaluation::MIDPOINT).abs() < f64::EPSILON);
        assert!((eval.elegance - AutoEvaluation::MIDPOINT).abs() < f64::EPSILON);
    }
}
