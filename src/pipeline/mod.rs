//! 流水线层：阶段数据模型、顺序编排器、用量聚合与失败状态

pub mod error;
pub mod orchestrator;
pub mod types;

pub use error::PipelineError;
pub use orchestrator::{Orchestrator, RunOutcome};
pub use types::{
    PipelineRun, RunMetrics, RunStatus, Stage, StageId, StageMetrics, StageResult, ToolInvocation,
    UsageTotals,
};
