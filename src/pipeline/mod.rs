//! Pipeline configuration and orchestration.

pub mod config;
pub mod orchestrator;

pub use config::{
    ConfigError, DiversificationConfig, GenerationConfig, ImprovementConfig, PipelineConfig,
    RunMode,
};
pub use orchestrator::{PipelineError, PipelineOrchestrator};
