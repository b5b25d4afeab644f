//! Structured-response extraction from raw LLM text.
//!
//! Model responses arrive as free text that usually, but not always, wraps a
//! JSON object in a markdown code fence. Extraction tries a fixed ladder of
//! strategies: strip fences, parse directly, re-parse after doubling
//! backslashes (LaTeX escapes break naive JSON), and for solutions only,
//! fall back to one synthesized step per non-blank line. Extraction performs
//! no I/O and never panics; it reports only "unparseable" vs "syntactic
//! success". Whether the parsed value has the right fields is the
//! validator's job.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Value};
use thiserror::Error;

/// What kind of record the caller expects the response to contain.
///
/// The shape steers the fallback ladder: only `Solution` gets the
/// line-extraction fallback, because a prose solution is still usable as a
/// step list while a prose problem or evaluation is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedShape {
    Problem,
    Solution,
    Evaluation,
}

impl ExpectedShape {
    fn name(&self) -> &'static str {
        match self {
            ExpectedShape::Problem => "problem",
            ExpectedShape::Solution => "solution",
            ExpectedShape::Evaluation => "evaluation",
        }
    }
}

/// Raised when every extraction strategy failed. Carries the offending text
/// so callers can log what the model actually said.
#[derive(Debug, Error)]
#[error("could not extract {} record from response: '{}'", .shape.name(), preview(.raw_text))]
pub struct ExtractionFailure {
    pub shape: ExpectedShape,
    pub raw_text: String,
}

impl ExtractionFailure {
    fn new(shape: ExpectedShape, raw_text: &str) -> Self {
        Self {
            shape,
            raw_text: raw_text.to_string(),
        }
    }
}

fn preview(raw_text: &str) -> &str {
    match raw_text.char_indices().nth(60) {
        Some((idx, _)) => &raw_text[..idx],
        None => raw_text,
    }
}

fn opening_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```json\s*").unwrap())
}

fn trailing_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```\s*$").unwrap())
}

/// Remove markdown code fences around a JSON payload.
///
/// Strips every ` ```json ` opener and a single trailing ` ``` `, then trims
/// whitespace. Text without fences passes through unchanged.
pub fn strip_code_fences(text: &str) -> String {
    let without_opener = opening_fence_re().replace_all(text, "");
    let trimmed = without_opener.trim();
    trailing_fence_re().replace(trimmed, "").trim().to_string()
}

fn double_backslashes(text: &str) -> String {
    text.replace('\\', "\\\\")
}

/// Extract a JSON value of the expected shape from raw model output.
pub fn extract(raw_text: &str, shape: ExpectedShape) -> Result<Value, ExtractionFailure> {
    let stripped = strip_code_fences(raw_text);

    if let Ok(value) = serde_json::from_str::<Value>(&stripped) {
        return Ok(value);
    }

    // Single backslashes from LaTeX (\frac, \sqrt) are invalid JSON escapes.
    if let Ok(value) = serde_json::from_str::<Value>(&double_backslashes(&stripped)) {
        return Ok(value);
    }

    if shape == ExpectedShape::Solution {
        let steps = extract_steps_from_lines(&stripped);
        if !steps.is_empty() {
            return Ok(json!({
                "steps": steps,
                "final_answer": 0,
                "key_insights": [],
            }));
        }
    }

    Err(ExtractionFailure::new(shape, raw_text))
}

/// Treat each non-blank line of prose as one solution step.
fn extract_steps_from_lines(text: &str) -> Vec<Value> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(i, line)| {
            json!({
                "step": i + 1,
                "description": line,
                "result": "",
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_json_parses() {
        let value = extract(r#"{"problem": "text", "answer": 42}"#, ExpectedShape::Problem)
            .expect("extract");
        assert_eq!(value["answer"], 42);
    }

    #[test]
    fn test_fenced_and_unfenced_agree() {
        let bare = r#"{"problem": "Find x such that x + 1 = 2", "answer": 1}"#;
        let fenced = format!("```json\n{bare}\n```");

        let from_bare = extract(bare, ExpectedShape::Problem).expect("bare");
        let from_fenced = extract(&fenced, ExpectedShape::Problem).expect("fenced");
        assert_eq!(from_bare, from_fenced);
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("{}"), "{}");
        assert_eq!(strip_code_fences("```json{}```"), "{}");
        assert_eq!(strip_code_fences("  {} "), "{}");
    }

    #[test]
    fn test_backslash_repair() {
        // \y is not a valid JSON escape; the repair pass doubles it.
        let raw = "```json\n{\"problem\": \"Compute x\\y for x = 20 and y = 4\", \"answer\": 5}\n```";
        let value = extract(raw, ExpectedShape::Problem).expect("extract");
        assert_eq!(value["answer"], 5);
        assert!(value["problem"].as_str().expect("str").contains("x\\y"));
    }

    #[test]
    fn test_prose_solution_uses_line_mode() {
        let raw = "First, factor the expression.\n\nThen substitute n = 3.\nFinally compute the sum.";
        let value = extract(raw, ExpectedShape::Solution).expect("extract");
        let steps = value["steps"].as_array().expect("steps array");
        assert_eq!(steps.len(), 3);
        for (i, step) in steps.iter().enumerate() {
            assert_eq!(step["step"], (i + 1) as u64);
            assert_eq!(step["result"], "");
        }
        assert_eq!(value["final_answer"], 0);
    }

    #[test]
    fn test_prose_problem_fails() {
        let err = extract("Here is a nice problem about triangles.", ExpectedShape::Problem)
            .expect_err("should fail");
        assert_eq!(err.shape, ExpectedShape::Problem);
    }

    #[test]
    fn test_prose_evaluation_fails() {
        assert!(extract("the solution looks correct to me", ExpectedShape::Evaluation).is_err());
    }

    #[test]
    fn test_empty_solution_text_fails() {
        assert!(extract("   \n  \n", ExpectedShape::Solution).is_err());
    }

    #[test]
    fn test_line_mode_counts_non_blank_lines() {
        let steps = extract_steps_from_lines("a\n\n\nb\n   \nc");
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[2]["step"], 3);
    }

    #[test]
    fn test_failure_preview_is_truncated() {
        let long = "x".repeat(500);
        let err = extract(&long, ExpectedShape::Problem).expect_err("should fail");
        let message = err.to_string();
        assert!(message.len() < 200);
        assert!(message.contains("problem"));
    }
}
