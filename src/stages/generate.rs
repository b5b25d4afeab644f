//! Stage 1: base problem generation.
//!
//! A seeded RNG picks a topic and a difficulty for each slot, the agent is
//! prompted for a JSON problem, and the result must pass extraction and
//! validation. A slot that keeps failing after the attempt budget is
//! skipped rather than looped on forever; the run simply yields fewer
//! problems.

use std::sync::Arc;

use rand::seq::IndexedRandom;
use rand::RngExt;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use crate::extract::{self, ExpectedShape};
use crate::llm::{Agent, CompletionConfig};
use crate::policy::{decide, Action, FailureKind};
use crate::prompts;
use crate::records::{ProblemRecord, Topic};
use crate::validate::{validate_problem, ValidatedProblem};

use super::STAGE1_TAG;

pub struct GenerateStage {
    agent: Arc<dyn Agent>,
    num_problems: usize,
    topics: Vec<Topic>,
    difficulty_range: (i64, i64),
    max_attempts: u32,
    completion: CompletionConfig,
    rng: ChaCha8Rng,
}

impl GenerateStage {
    pub fn new(
        agent: Arc<dyn Agent>,
        num_problems: usize,
        topics: Vec<Topic>,
        difficulty_range: (i64, i64),
        max_attempts: u32,
        completion: CompletionConfig,
        rng: ChaCha8Rng,
    ) -> Self {
        Self {
            agent,
            num_problems,
            topics,
            difficulty_range,
            max_attempts,
            completion: completion.with_system(prompts::GENERATOR_SYSTEM),
            rng,
        }
    }

    /// Generate the base problem set.
    pub async fn run(&mut self) -> Vec<ProblemRecord> {
        let mut problems = Vec::with_capacity(self.num_problems);

        for i in 0..self.num_problems {
            let topic = self
                .topics
                .choose(&mut self.rng)
                .copied()
                .unwrap_or(Topic::Mixed);
            let difficulty = self
                .rng
                .random_range(self.difficulty_range.0..=self.difficulty_range.1);

            info!(slot = i + 1, total = self.num_problems, %topic, difficulty, "Generating problem");

            match self.generate_one(topic, difficulty).await {
                Some(validated) => {
                    let record = validated
                        .into_record(format!("gen_{}", i + 1))
                        .with_stage(STAGE1_TAG)
                        .with_source("chat_agent");
                    problems.push(record);
                }
                None => {
                    warn!(slot = i + 1, "Exhausted attempts, skipping slot");
                }
            }
        }

        info!(generated = problems.len(), requested = self.num_problems, "Stage 1 generation done");
        problems
    }

    /// One slot's bounded generate-validate loop. Returns `None` when the
    /// attempt budget is spent.
    async fn generate_one(&mut self, topic: Topic, difficulty: i64) -> Option<ValidatedProblem> {
        let prompt = prompts::problem_generation_prompt(topic, difficulty);
        let mut attempts = 0;

        loop {
            let failure = match self.agent.complete(&prompt, &self.completion).await {
                Ok(response) => match extract::extract(&response, ExpectedShape::Problem) {
                    Ok(value) => match validate_problem(&value) {
                        Ok(validated) => return Some(validated),
                        Err(err) => {
                            warn!(error = %err, "Generated problem failed validation");
                            FailureKind::Validation
                        }
                    },
                    Err(err) => {
                        warn!(error = %err, "Could not extract problem from response");
                        FailureKind::Extraction
                    }
                },
                Err(err) if err.is_fatal() => {
                    warn!(error = %err, "Fatal agent error during generation");
                    return None;
                }
                Err(err) => {
                    warn!(error = %err, "Agent call failed");
                    FailureKind::Extraction
                }
            };

            attempts += 1;
            // A whole-problem failure has nothing to substitute, so both
            // failure kinds end the slot once the budget is spent.
            match decide(failure, attempts, self.max_attempts) {
                Action::Retry => continue,
                Action::Substitute | Action::SkipKeepOriginal => return None,
            }
        }
    }
}
