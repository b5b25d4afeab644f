//! Chains the four stages through their artifacts.
//!
//! Each stage reads the previous stage's record list, transforms it, and
//! persists exactly one artifact. Stages can also be run individually with
//! an explicit input, which is how the CLI's `stage` subcommand works.

use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::error::LlmError;
use crate::llm::{Agent, CompletionConfig};
use crate::records::ProblemRecord;
use crate::stage::StageRunner;
use crate::stages::{DiversifyStage, GenerateStage, ImproveStage, SolveStage};
use crate::storage::StorageError;

use super::config::{ConfigError, PipelineConfig};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Agent(#[from] LlmError),
    #[error("no stage numbered {0}: valid stages are 1-4")]
    UnknownStage(u8),
}

pub struct PipelineOrchestrator {
    agent: Arc<dyn Agent>,
    config: PipelineConfig,
    run_id: Uuid,
}

impl PipelineOrchestrator {
    /// Validates the configuration up front; a bad config fails here,
    /// before any stage runs.
    pub fn new(agent: Arc<dyn Agent>, config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            agent,
            config,
            run_id: Uuid::new_v4(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn completion(&self) -> CompletionConfig {
        CompletionConfig::default()
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens)
    }

    /// Run all four stages in order, persisting one artifact per stage.
    /// Returns the final record list.
    pub async fn run_all(&self) -> Result<Vec<ProblemRecord>, PipelineError> {
        info!(run_id = %self.run_id, "Starting pipeline run");
        let records = self.run_stage1().await?;
        let records = self.run_stage2(records).await?;
        let records = self.run_stage3(records).await?;
        let records = self.run_stage4(records).await?;
        info!(records = records.len(), "Pipeline complete");
        Ok(records)
    }

    /// Run one stage by ordinal over the given input. Stage 1 ignores the
    /// input.
    pub async fn run_stage(
        &self,
        stage: u8,
        input: Vec<ProblemRecord>,
    ) -> Result<Vec<ProblemRecord>, PipelineError> {
        match stage {
            1 => self.run_stage1().await,
            2 => self.run_stage2(input).await,
            3 => self.run_stage3(input).await,
            4 => self.run_stage4(input).await,
            other => Err(PipelineError::UnknownStage(other)),
        }
    }

    async fn run_stage1(&self) -> Result<Vec<ProblemRecord>, PipelineError> {
        info!("Stage 1: base problem generation");
        let mut stage = GenerateStage::new(
            Arc::clone(&self.agent),
            self.config.generation.num_problems,
            self.config.generation.topics.clone(),
            self.config.generation.difficulty_range,
            self.config.max_attempts,
            self.completion(),
            ChaCha8Rng::seed_from_u64(self.config.seed),
        );
        let records = stage.run().await;

        let runner = StageRunner::new("stage1_base", self.config.stage1_path());
        runner.persist(&records)?;
        Ok(records)
    }

    async fn run_stage2(
        &self,
        input: Vec<ProblemRecord>,
    ) -> Result<Vec<ProblemRecord>, PipelineError> {
        info!(input = input.len(), "Stage 2: diversification");
        // Distinct RNG stream from stage 1.
        let mut stage = DiversifyStage::new(
            Arc::clone(&self.agent),
            self.config.diversification.num_variations,
            self.config.diversification.seed_limit,
            self.config.max_attempts,
            self.completion(),
            ChaCha8Rng::seed_from_u64(self.config.seed.wrapping_add(1)),
        );

        let runner = StageRunner::new("stage2_diversified", self.config.stage2_path());
        let records = runner.run_additive(input, &mut stage).await;
        runner.persist(&records)?;
        Ok(records)
    }

    async fn run_stage3(
        &self,
        input: Vec<ProblemRecord>,
    ) -> Result<Vec<ProblemRecord>, PipelineError> {
        info!(input = input.len(), "Stage 3: solution generation");
        let mut stage = SolveStage::new(
            Arc::clone(&self.agent),
            self.config.max_attempts,
            self.completion(),
        );

        let runner = StageRunner::new("stage3_with_solutions", self.config.stage3_path());
        let records = runner.run_map(input, &mut stage).await;
        info!(
            solved = stage.success_count(),
            total = records.len(),
            "Solution success rate"
        );
        runner.persist(&records)?;
        Ok(records)
    }

    async fn run_stage4(
        &self,
        input: Vec<ProblemRecord>,
    ) -> Result<Vec<ProblemRecord>, PipelineError> {
        info!(input = input.len(), "Stage 4: quality improvement");
        let mut stage = ImproveStage::new(
            Arc::clone(&self.agent),
            self.config.improvement.max_iterations,
            self.config.max_attempts,
            self.config.improvement.thresholds,
            self.completion(),
        );

        let runner = StageRunner::new("stage4_improved", self.config.stage4_path());
        let records = runner.run_map(input, &mut stage).await;
        runner.persist(&records)?;
        Ok(records)
    }
}
