//! Pipeline configuration.
//!
//! All numeric knobs live here, with run-mode presets layered on top of
//! the defaults. Configuration is validated once, before the agent is
//! constructed; a bad config never reaches a stage.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use thiserror::Error;

use crate::policy::QualityThresholds;
use crate::records::Topic;

/// Valid difficulty scale for problems.
pub const DIFFICULTY_SCALE: (i64, i64) = (1, 15);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("num_problems must be at least 1")]
    NoProblems,
    #[error("num_variations must be at least 1")]
    NoVariations,
    #[error("difficulty range ({0}, {1}) is invalid: must be ordered and within 1-15")]
    BadDifficultyRange(i64, i64),
    #[error("temperature {0} outside valid range 0.0-2.0")]
    BadTemperature(f64),
    #[error("max_attempts must be at least 1")]
    NoAttempts,
    #[error("max_iterations must be at least 1")]
    NoIterations,
    #[error("topic list must not be empty")]
    NoTopics,
}

/// Stage 1 knobs.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub num_problems: usize,
    pub topics: Vec<Topic>,
    pub difficulty_range: (i64, i64),
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            num_problems: 10,
            topics: Topic::GENERATION_TOPICS.to_vec(),
            difficulty_range: (6, 9),
        }
    }
}

/// Stage 2 knobs.
#[derive(Debug, Clone)]
pub struct DiversificationConfig {
    pub num_variations: usize,
    /// How many originals are used as variation seeds.
    pub seed_limit: usize,
}

impl Default for DiversificationConfig {
    fn default() -> Self {
        Self {
            num_variations: 20,
            seed_limit: 5,
        }
    }
}

/// Stage 4 knobs.
#[derive(Debug, Clone)]
pub struct ImprovementConfig {
    pub max_iterations: u32,
    pub thresholds: QualityThresholds,
}

impl Default for ImprovementConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            thresholds: QualityThresholds::default(),
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub output_dir: PathBuf,
    pub seed: u64,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Retry budget for extraction and validation failures.
    pub max_attempts: u32,
    pub generation: GenerationConfig,
    pub diversification: DiversificationConfig,
    pub improvement: ImprovementConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            seed: 42,
            temperature: 0.7,
            max_tokens: 4000,
            max_attempts: 3,
            generation: GenerationConfig::default(),
            diversification: DiversificationConfig::default(),
            improvement: ImprovementConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// A config preset for the given run mode.
    pub fn for_mode(mode: RunMode) -> Self {
        let mut config = Self::default();
        match mode {
            RunMode::Test => {
                config.generation.num_problems = 2;
                config.diversification.num_variations = 3;
                config.improvement.max_iterations = 2;
            }
            RunMode::Quick => {
                config.generation.num_problems = 5;
                config.diversification.num_variations = 10;
            }
            RunMode::Full => {}
        }
        config
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_num_problems(mut self, num_problems: usize) -> Self {
        self.generation.num_problems = num_problems;
        self
    }

    pub fn with_num_variations(mut self, num_variations: usize) -> Self {
        self.diversification.num_variations = num_variations;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.improvement.max_iterations = max_iterations;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.num_problems == 0 {
            return Err(ConfigError::NoProblems);
        }
        if self.generation.topics.is_empty() {
            return Err(ConfigError::NoTopics);
        }
        let (lo, hi) = self.generation.difficulty_range;
        if lo > hi || lo < DIFFICULTY_SCALE.0 || hi > DIFFICULTY_SCALE.1 {
            return Err(ConfigError::BadDifficultyRange(lo, hi));
        }
        if self.diversification.num_variations == 0 {
            return Err(ConfigError::NoVariations);
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::BadTemperature(self.temperature));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::NoAttempts);
        }
        if self.improvement.max_iterations == 0 {
            return Err(ConfigError::NoIterations);
        }
        Ok(())
    }

    pub fn stage1_path(&self) -> PathBuf {
        self.output_dir.join("stage1_base_problems.json")
    }

    pub fn stage2_path(&self) -> PathBuf {
        self.output_dir.join("stage2_diversified.json")
    }

    pub fn stage3_path(&self) -> PathBuf {
        self.output_dir.join("stage3_with_solutions.json")
    }

    pub fn stage4_path(&self) -> PathBuf {
        self.output_dir.join("stage4_improved.json")
    }

    /// Artifact path for a stage by ordinal (1-4).
    pub fn stage_path(&self, stage: u8) -> Option<PathBuf> {
        match stage {
            1 => Some(self.stage1_path()),
            2 => Some(self.stage2_path()),
            3 => Some(self.stage3_path()),
            4 => Some(self.stage4_path()),
            _ => None,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// Named presets for common run sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunMode {
    /// Smallest possible end-to-end run.
    Test,
    /// A reduced run for iteration.
    Quick,
    /// The full dataset run.
    Full,
}
