//! The four pipeline stages.
//!
//! Stage 1 generates base problems from nothing, stage 2 expands the set
//! with variations, stage 3 attaches solutions, stage 4 runs the bounded
//! quality-improvement loop. Stages 3 and 4 plug into the stage runner as
//! transforms; stage 2 as an expander.

pub mod diversify;
pub mod generate;
pub mod improve;
pub mod solve;

pub use diversify::DiversifyStage;
pub use generate::GenerateStage;
pub use improve::ImproveStage;
pub use solve::SolveStage;

/// Stage tag written into records produced by stage 1.
pub const STAGE1_TAG: &str = "stage1_base";
/// Stage tag written into records produced by stage 2.
pub const STAGE2_TAG: &str = "stage2_diversified";
