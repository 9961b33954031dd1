//! 流水线错误类型
//!
//! 阶段失败与取消都携带已聚合的部分用量，失败时运营侧仍可做成本归因。

use thiserror::Error;

use crate::agent::AgentError;
use crate::pipeline::types::{StageId, UsageTotals};

/// 一次运行的终止性错误
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 任何阶段执行前的构建失败（客户端 / 配置）
    #[error("Setup failed: {0}")]
    Setup(String),

    /// 阶段链不合法（依赖指向不存在或未在前面声明的阶段、阶段 ID 重复）
    #[error("Invalid stage chain: {0}")]
    InvalidChain(String),

    /// 某阶段失败：携带阶段标识与失败前聚合的用量
    #[error("Stage '{stage}' failed: {source}")]
    StageFailed {
        stage: StageId,
        #[source]
        source: AgentError,
        usage: UsageTotals,
    },

    /// 运行被取消
    #[error("Run cancelled")]
    Cancelled { usage: UsageTotals },
}

impl PipelineError {
    /// 终止前已聚合的用量（Setup / InvalidChain 阶段尚未运行，为零）
    pub fn partial_usage(&self) -> UsageTotals {
        match self {
            PipelineError::StageFailed { usage, .. } | PipelineError::Cancelled { usage } => *usage,
            _ => UsageTotals::default(),
        }
    }
}
