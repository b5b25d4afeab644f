//! Record types flowing through the generation pipeline.
//!
//! Every stage consumes and produces lists of [`ProblemRecord`]s. Records are
//! values: a stage copies the previous stage's records and adds fields, it
//! never removes any or reaches back into an earlier artifact. Later-stage
//! fields are optional and omitted from JSON until the stage that owns them
//! fills them in, so a stage-1 artifact stays readable as-is.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lower bound of a valid AIME answer.
pub const ANSWER_MIN: i64 = 0;
/// Upper bound of a valid AIME answer.
pub const ANSWER_MAX: i64 = 999;

/// Math topic of a problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Topic {
    #[serde(rename = "Number Theory")]
    NumberTheory,
    Algebra,
    Geometry,
    Combinatorics,
    Probability,
    /// Topic could not be pinned to a single category.
    Mixed,
    /// Topic information was absent from the source text.
    Unknown,
}

impl Topic {
    /// The fixed set of topics problems are generated from.
    pub const GENERATION_TOPICS: [Topic; 5] = [
        Topic::NumberTheory,
        Topic::Algebra,
        Topic::Geometry,
        Topic::Combinatorics,
        Topic::Probability,
    ];

    /// Display name as used in prompts and artifacts.
    pub fn name(&self) -> &'static str {
        match self {
            Topic::NumberTheory => "Number Theory",
            Topic::Algebra => "Algebra",
            Topic::Geometry => "Geometry",
            Topic::Combinatorics => "Combinatorics",
            Topic::Probability => "Probability",
            Topic::Mixed => "Mixed",
            Topic::Unknown => "Unknown",
        }
    }

    /// Parse a topic from free text, tolerating case differences.
    /// Unrecognized names map to `Unknown`.
    pub fn parse(s: &str) -> Topic {
        match s.trim().to_lowercase().as_str() {
            "number theory" => Topic::NumberTheory,
            "algebra" => Topic::Algebra,
            "geometry" => Topic::Geometry,
            "combinatorics" => Topic::Combinatorics,
            "probability" => Topic::Probability,
            "mixed" => Topic::Mixed,
            _ => Topic::Unknown,
        }
    }

    /// Infer a topic from instruction or problem text by keyword.
    pub fn infer(text: &str) -> Topic {
        let lower = text.to_lowercase();
        if lower.contains("number theory") || lower.contains("divisor") {
            Topic::NumberTheory
        } else if lower.contains("algebra") || lower.contains("sequence") {
            Topic::Algebra
        } else if lower.contains("geometry") || lower.contains("triangle") {
            Topic::Geometry
        } else if lower.contains("combinatorics") || lower.contains("counting") {
            Topic::Combinatorics
        } else if lower.contains("probability") {
            Topic::Probability
        } else {
            Topic::Mixed
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One reasoning step of a solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// 1-based position in the step sequence. Values are unique and
    /// increasing, but gaps are tolerated: not every extraction path
    /// produces dense numbering.
    pub step: u32,
    /// What the step does.
    pub description: String,
    /// Intermediate result, possibly empty.
    #[serde(default)]
    pub result: String,
}

/// How a solution was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolutionMethod {
    /// Structured chain-of-thought search against a golden answer.
    CotMcts,
    /// Single direct prompt, no golden-answer check.
    Direct,
    /// Solution generation failed entirely.
    Failed,
}

/// A step-by-step solution attached to a problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionRecord {
    pub method: SolutionMethod,
    /// Ordered reasoning steps. May be empty when `method` is `Failed`.
    pub steps: Vec<StepRecord>,
    /// The answer the solution arrived at. Kept as raw JSON: later stages
    /// never re-validate its type, and some extraction paths cannot
    /// guarantee an integer here.
    pub final_answer: Value,
    /// Whether the final answer was checked against the golden answer.
    pub verified: bool,
    /// Error text when `method` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SolutionRecord {
    /// A solution representing total generation failure. `final_answer`
    /// falls back to the problem's declared answer.
    pub fn failed(declared_answer: i64, error: impl Into<String>) -> Self {
        Self {
            method: SolutionMethod::Failed,
            steps: Vec::new(),
            final_answer: Value::from(declared_answer),
            verified: false,
            error: Some(error.into()),
        }
    }

    /// The final answer as an integer, when it is one.
    pub fn final_answer_i64(&self) -> Option<i64> {
        self.final_answer.as_i64()
    }
}

/// Automatic quality judgment over a problem/solution pair.
///
/// All scores live on the 0.0–1.0 scale. This is deliberately a distinct
/// type from [`HumanVerdict`], which scores 1–5: the two scales share field
/// names but must never be conflated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutoEvaluation {
    pub correctness: f64,
    pub clarity: f64,
    pub completeness: f64,
    pub elegance: f64,
}

impl AutoEvaluation {
    /// Midpoint of the 0.0–1.0 scale, substituted for missing scores.
    pub const MIDPOINT: f64 = 0.5;

    /// An evaluation with every score at the scale midpoint.
    pub fn midpoint() -> Self {
        Self {
            correctness: Self::MIDPOINT,
            clarity: Self::MIDPOINT,
            completeness: Self::MIDPOINT,
            elegance: Self::MIDPOINT,
        }
    }

    /// Mean of the four scores.
    pub fn mean(&self) -> f64 {
        (self.correctness + self.clarity + self.completeness + self.elegance) / 4.0
    }
}

/// Human quality judgment from the verification session.
///
/// Scores are integers on the 1–5 scale. Distinct from [`AutoEvaluation`]
/// by design; see that type's docs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanVerdict {
    pub correctness: u8,
    pub clarity: u8,
    pub difficulty_match: u8,
    pub completeness: u8,
    pub status: VerdictStatus,
    #[serde(default)]
    pub comments: String,
}

/// Reviewer decision attached to a [`HumanVerdict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    Approved,
    Rejected,
    NeedsRevision,
}

/// One recorded iteration of the stage-4 improvement loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based iteration number.
    pub iteration: u32,
    pub evaluation: AutoEvaluation,
}

/// One generated math problem, the unit of pipeline data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemRecord {
    /// Unique within a run (e.g. `gen_3`, `div_7`).
    pub id: String,
    /// Problem statement. Validated to be at least 20 characters.
    pub problem: String,
    /// Declared answer, validated into `[0, 999]` before acceptance.
    pub answer: i64,
    pub topic: Topic,
    /// Nominal range 1–15; AIME problems sit at 6–9.
    pub difficulty: i64,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    /// Which pipeline stage produced this record.
    pub stage: String,
    /// Provenance tag (e.g. `chat_agent`, `variation`).
    pub source: String,
    /// True when `answer` was drawn at random rather than extracted. Lets
    /// downstream consumers detect fabricated answers.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fabricated_answer: bool,

    // Stage 3 fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<SolutionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_solution: Option<bool>,

    // Stage 4 fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub improvement_history: Vec<IterationRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_evaluation: Option<AutoEvaluation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improvement_suggestions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improved: Option<bool>,

    /// Set when a stage exhausted its retries and kept the record as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProblemRecord {
    /// Create a minimal record as stage 1 produces it.
    pub fn new(
        id: impl Into<String>,
        problem: impl Into<String>,
        answer: i64,
        topic: Topic,
        difficulty: i64,
    ) -> Self {
        Self {
            id: id.into(),
            problem: problem.into(),
            answer,
            topic,
            difficulty,
            tags: BTreeSet::new(),
            stage: String::new(),
            source: String::new(),
            fabricated_answer: false,
            solution: None,
            has_solution: None,
            improvement_history: Vec::new(),
            final_evaluation: None,
            quality_score: None,
            improvement_suggestions: None,
            improved: None,
            error: None,
        }
    }

    /// Sets the stage tag.
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = stage.into();
        self
    }

    /// Sets the provenance tag.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Sets the tag set.
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }

    /// Marks the answer as fabricated.
    pub fn with_fabricated_answer(mut self) -> Self {
        self.fabricated_answer = true;
        self
    }

    /// Whether the declared answer is inside the valid AIME range.
    pub fn answer_in_range(&self) -> bool {
        (ANSWER_MIN..=ANSWER_MAX).contains(&self.answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_parse_roundtrip() {
        for topic in Topic::GENERATION_TOPICS {
            assert_eq!(Topic::parse(topic.name()), topic);
        }
        assert_eq!(Topic::parse("number THEORY"), Topic::NumberTheory);
        assert_eq!(Topic::parse("calculus"), Topic::Unknown);
    }

    #[test]
    fn test_topic_infer() {
        assert_eq!(
            Topic::infer("Find the number of positive divisors of 2024"),
            Topic::NumberTheory
        );
        assert_eq!(
            Topic::infer("A triangle has sides 13, 14, 15"),
            Topic::Geometry
        );
        assert_eq!(
            Topic::infer("What is the probability that"),
            Topic::Probability
        );
        assert_eq!(Topic::infer("Compute the value of x"), Topic::Mixed);
    }

    #[test]
    fn test_topic_serde_names() {
        let json = serde_json::to_string(&Topic::NumberTheory).expect("serialize");
        assert_eq!(json, "\"Number Theory\"");
        let back: Topic = serde_json::from_str("\"Algebra\"").expect("deserialize");
        assert_eq!(back, Topic::Algebra);
    }

    #[test]
    fn test_solution_failed_falls_back_to_declared_answer() {
        let solution = SolutionRecord::failed(57, "agent unavailable");
        assert_eq!(solution.method, SolutionMethod::Failed);
        assert!(solution.steps.is_empty());
        assert_eq!(solution.final_answer_i64(), Some(57));
        assert!(!solution.verified);
    }

    #[test]
    fn test_solution_method_serde() {
        let json = serde_json::to_string(&SolutionMethod::CotMcts).expect("serialize");
        assert_eq!(json, "\"cot_mcts\"");
    }

    #[test]
    fn test_auto_evaluation_midpoint() {
        let eval = AutoEvaluation::midpoint();
        assert!((eval.correctness - 0.5).abs() < f64::EPSILON);
        assert!((eval.mean() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_builder() {
        let record = ProblemRecord::new("gen_1", "Find the sum of all x", 42, Topic::Algebra, 7)
            .with_stage("stage1_base")
            .with_source("chat_agent")
            .with_tags(vec!["sums".to_string(), "integers".to_string()]);

        assert_eq!(record.id, "gen_1");
        assert_eq!(record.stage, "stage1_base");
        assert_eq!(record.tags.len(), 2);
        assert!(record.answer_in_range());
        assert!(!record.fabricated_answer);
    }

    #[test]
    fn test_answer_range_boundaries() {
        let mut record = ProblemRecord::new("p", "x", 0, Topic::Mixed, 7);
        assert!(record.answer_in_range());
        record.answer = 999;
        assert!(record.answer_in_range());
        record.answer = 1000;
        assert!(!record.answer_in_range());
        record.answer = -1;
        assert!(!record.answer_in_range());
    }

    #[test]
    fn test_record_json_omits_unset_stage_fields() {
        let record = ProblemRecord::new("gen_1", "Some problem text", 1, Topic::Geometry, 6);
        let json = serde_json::to_string(&record).expect("serialize");
        assert!(!json.contains("solution"));
        assert!(!json.contains("improvement_history"));
        assert!(!json.contains("fabricated_answer"));
        assert!(!json.contains("tags"));

        let back: ProblemRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, record);
    }
}
