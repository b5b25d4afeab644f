//! Stage 2: problem diversification.
//!
//! Variations are prompted one at a time from a rotating window of seed
//! problems. A variation that parses as JSON goes through the normal
//! problem validation; a variation that comes back as prose is still
//! salvaged, the way the record fields allow: the prose becomes the
//! problem text, the answer is recovered from the text by pattern or, as a
//! last resort, drawn at random and flagged as fabricated, the topic is
//! inferred by keyword, and the difficulty falls back to 7.

use std::sync::Arc;
use std::sync::OnceLock;

use async_trait::async_trait;
use rand_chacha::ChaCha8Rng;
use regex::Regex;
use tracing::{info, warn};

use crate::extract::{self, ExpectedShape};
use crate::llm::{Agent, CompletionConfig};
use crate::policy::{self, decide, Action, FailureKind};
use crate::prompts;
use crate::records::{ProblemRecord, Topic, ANSWER_MAX, ANSWER_MIN};
use crate::stage::RecordExpander;
use crate::validate::validate_problem;

use super::STAGE2_TAG;

/// Default difficulty assigned to salvaged prose variations.
const FALLBACK_DIFFICULTY: i64 = 7;

pub struct DiversifyStage {
    agent: Arc<dyn Agent>,
    num_variations: usize,
    /// Only the first `seed_limit` originals are used as variation seeds.
    seed_limit: usize,
    max_attempts: u32,
    completion: CompletionConfig,
    rng: ChaCha8Rng,
}

impl DiversifyStage {
    pub fn new(
        agent: Arc<dyn Agent>,
        num_variations: usize,
        seed_limit: usize,
        max_attempts: u32,
        completion: CompletionConfig,
        rng: ChaCha8Rng,
    ) -> Self {
        Self {
            agent,
            num_variations,
            seed_limit,
            max_attempts,
            completion: completion.with_system(prompts::DIVERSIFIER_SYSTEM),
            rng,
        }
    }

    /// One variation's bounded prompt-extract-validate loop.
    async fn generate_variation(&mut self, seed: &ProblemRecord, n: usize) -> Option<ProblemRecord> {
        let prompt = prompts::variation_prompt(seed);
        let id = format!("div_{n}");
        let mut attempts = 0;
        let mut last_response: Option<String> = None;

        loop {
            match self.agent.complete(&prompt, &self.completion).await {
                Ok(response) => match extract::extract(&response, ExpectedShape::Problem) {
                    Ok(value) => match validate_problem(&value) {
                        Ok(validated) => {
                            return Some(
                                validated
                                    .into_record(id)
                                    .with_stage(STAGE2_TAG)
                                    .with_source("variation"),
                            );
                        }
                        Err(err) => {
                            // Parsed but malformed; not salvageable as prose.
                            warn!(error = %err, "Variation failed validation");
                        }
                    },
                    Err(_) => {
                        last_response = Some(response);
                    }
                },
                Err(err) if err.is_fatal() => {
                    warn!(error = %err, "Fatal agent error during diversification");
                    return None;
                }
                Err(err) => {
                    warn!(error = %err, "Agent call failed for variation");
                }
            }

            attempts += 1;
            match decide(FailureKind::Extraction, attempts, self.max_attempts) {
                Action::Retry => continue,
                Action::Substitute => {
                    return last_response.and_then(|text| self.salvage_prose(&text, id));
                }
                Action::SkipKeepOriginal => return None,
            }
        }
    }

    /// Build a record from a prose response. Returns `None` when the text is
    /// too short to be a problem at all.
    fn salvage_prose(&mut self, text: &str, id: String) -> Option<ProblemRecord> {
        let problem_text = text.trim();
        if problem_text.chars().count() < crate::validate::MIN_PROBLEM_LEN {
            return None;
        }

        let (answer, fabricated) = match recover_answer(problem_text) {
            Some(answer) => (answer, false),
            None => (policy::fabricated_answer(&mut self.rng), true),
        };

        let topic = Topic::infer(problem_text);
        let mut record =
            ProblemRecord::new(id, problem_text, answer, topic, FALLBACK_DIFFICULTY)
                .with_stage(STAGE2_TAG)
                .with_source("variation");
        if fabricated {
            record = record.with_fabricated_answer();
        }
        Some(record)
    }
}

fn answer_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(?i)answer is (\d+)").unwrap(),
            Regex::new(r"(?i)answer: (\d+)").unwrap(),
            Regex::new(r"= (\d+)\s*$").unwrap(),
        ]
    })
}

/// Pull an in-range answer out of problem text, trying each pattern in
/// order. Out-of-range matches fall through to the next pattern.
fn recover_answer(text: &str) -> Option<i64> {
    for pattern in answer_patterns() {
        if let Some(answer) = pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<i64>().ok())
        {
            if (ANSWER_MIN..=ANSWER_MAX).contains(&answer) {
                return Some(answer);
            }
        }
    }
    None
}

#[async_trait]
impl RecordExpander for DiversifyStage {
    async fn expand(&mut self, originals: &[ProblemRecord]) -> Vec<ProblemRecord> {
        if originals.is_empty() {
            return Vec::new();
        }

        let seeds: Vec<ProblemRecord> = originals
            .iter()
            .take(self.seed_limit.max(1))
            .cloned()
            .collect();

        let mut variations = Vec::with_capacity(self.num_variations);
        for n in 0..self.num_variations {
            let seed = &seeds[n % seeds.len()];
            match self.generate_variation(seed, n + 1).await {
                Some(record) => variations.push(record),
                None => warn!(variation = n + 1, "Could not produce variation"),
            }
        }

        info!(
            produced = variations.len(),
            requested = self.num_variations,
            "Stage 2 diversification done"
        );
        variations
    }
}
