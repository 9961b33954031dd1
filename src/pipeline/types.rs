//! 流水线类型定义
//!
//! 阶段（Stage）是纯配置：指令模板、预期输出与上游依赖；执行一次产出一个
//! StageResult（文本 + token 用量 + 工具调用审计）。PipelineRun 持有阶段链、
//! 已完成结果、状态与聚合用量。

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::agent::AgentSpec;
use crate::tools::executor::args_preview;

pub type StageId = String;

/// 运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    /// 已创建，等待执行
    Pending,
    /// 正在执行
    Running,
    /// 全部阶段完成
    Succeeded,
    /// 某阶段失败，后续阶段未执行
    Failed,
}

/// token 用量（prompt / completion）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageTotals {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl UsageTotals {
    pub fn add(&mut self, prompt: u64, completion: u64) {
        self.prompt_tokens += prompt;
        self.completion_tokens += completion;
    }

    pub fn merge(&mut self, other: UsageTotals) {
        self.add(other.prompt_tokens, other.completion_tokens);
    }

    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// 阶段：一个 Agent 的一份工作，执行前只是配置
#[derive(Clone)]
pub struct Stage {
    /// 阶段标识（链内唯一）
    pub id: StageId,
    /// 指令模板（主题与时间窗口已代入）
    pub description: String,
    /// 预期输出描述（进 prompt，并用于最小形状校验）
    pub expected_output: String,
    /// 执行该阶段的 Agent
    pub agent: Arc<AgentSpec>,
    /// 上游依赖（声明顺序即注入顺序）；本系统为链，入度 <= 1
    pub depends_on: Vec<StageId>,
}

/// 一次工具调用的不可变审计记录
#[derive(Debug, Clone, Serialize)]
pub struct ToolInvocation {
    pub tool: String,
    pub args_preview: String,
    pub ok: bool,
    /// 成功时为结果预览，失败时为错误描述
    pub outcome: String,
    /// Unix 毫秒时间戳
    pub timestamp: i64,
}

impl ToolInvocation {
    fn record(tool: &str, args: &serde_json::Value, ok: bool, outcome: String) -> Self {
        Self {
            tool: tool.to_string(),
            args_preview: args_preview(args),
            ok,
            outcome,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn succeeded(tool: &str, args: &serde_json::Value, result: &str) -> Self {
        let preview: String = result.chars().take(200).collect();
        Self::record(tool, args, true, preview)
    }

    pub fn failed(tool: &str, args: &serde_json::Value, error: &str) -> Self {
        Self::record(tool, args, false, error.to_string())
    }

    pub fn rejected(tool: &str, args: &serde_json::Value) -> Self {
        Self::record(tool, args, false, "not available to this agent".to_string())
    }
}

/// 阶段执行结果，创建后不再修改
#[derive(Debug, Clone)]
pub struct StageResult {
    pub text: String,
    pub usage: UsageTotals,
    pub tool_calls: Vec<ToolInvocation>,
}

/// 一次端到端执行：阶段链 + 已完成结果 + 状态 + 聚合用量
pub struct PipelineRun {
    pub id: String,
    pub stages: Vec<Stage>,
    pub results: HashMap<StageId, StageResult>,
    pub status: RunStatus,
    /// 恒等于已完成阶段用量之和（每个阶段完成后更新，失败阶段不计入）
    pub aggregate: UsageTotals,
    pub created_at: i64,
}

impl PipelineRun {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self {
            id: format!("run_{}", uuid::Uuid::new_v4()),
            stages,
            results: HashMap::new(),
            status: RunStatus::Pending,
            aggregate: UsageTotals::default(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn result(&self, id: &str) -> Option<&StageResult> {
        self.results.get(id)
    }
}

/// 单阶段的用量与调用统计（进 JSON 用量日志）
#[derive(Debug, Clone, Serialize)]
pub struct StageMetrics {
    pub stage: StageId,
    pub role: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub tool_calls: usize,
}

/// 整次运行的用量汇总（进 JSON 用量日志）
#[derive(Debug, Clone, Serialize)]
pub struct RunMetrics {
    pub run_id: String,
    pub status: RunStatus,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub stages: Vec<StageMetrics>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_totals_merge() {
        let mut a = UsageTotals::default();
        assert_eq!(a.total(), 0);
        a.add(10, 5);
        a.merge(UsageTotals {
            prompt_tokens: 1,
            completion_tokens: 2,
        });
        assert_eq!(a.prompt_tokens, 11);
        assert_eq!(a.completion_tokens, 7);
        assert_eq!(a.total(), 18);
    }

    #[test]
    fn invocation_records() {
        let args = serde_json::json!({"url": "https://a"});
        let ok = ToolInvocation::succeeded("cite", &args, "[https://a] (Accessed on ...)");
        assert!(ok.ok);
        assert_eq!(ok.tool, "cite");
        let rejected = ToolInvocation::rejected("scrape", &args);
        assert!(!rejected.ok);
        assert!(rejected.outcome.contains("not available"));
    }
}
