//! Agent 执行循环
//!
//! Plan -> Act (Tool) -> Observe -> 下一轮 Plan；最大往返次数保证终止。
//! LLM 输出要么是 JSON Tool Call（{"tool": ..., "args": ...}），要么是最终答案纯文本。
//! 可恢复的工具错误作为 Observation 回给 LLM 绕行（跳过该输入继续），
//! 致命错误与往返预算耗尽升级为阶段失败。声明集合之外的工具调用一律
//! 拒绝并记录，绝不静默执行。

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::agent::AgentSpec;
use crate::llm::{LlmClient, Message};
use crate::pipeline::types::{StageResult, ToolInvocation, UsageTotals};
use crate::tools::{ToolError, ToolExecutor};

/// 阶段执行过程中的错误（升级为 StageFailed）
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Tool failed fatally: {0}")]
    FatalTool(#[source] ToolError),

    #[error("Step budget exhausted after {steps} rounds")]
    StepBudgetExhausted { steps: usize },

    #[error("Agent '{role}' produced an empty result")]
    EmptyResult { role: String },

    #[error("Cancelled")]
    Cancelled,
}

/// LLM 返回的 Tool Call（简化 JSON：{"tool": "scrape", "args": {"url": "..."}}）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// 单轮 LLM 输出的解析结果
#[derive(Debug, Clone)]
pub enum PlannerOutput {
    /// 最终答案
    Response(String),
    /// 需要执行工具
    ToolCall(ToolCall),
}

/// 解析 LLM 输出：若含带 "tool" 键的有效 JSON 则为 ToolCall，否则为最终答案。
/// JSON 块疑似工具调用但解析失败时返回 Err，由调用方注入纠正提示重试。
pub fn parse_llm_output(output: &str) -> Result<PlannerOutput, String> {
    let trimmed = output.trim();

    // 尝试提取 JSON 块（```json ... ``` 或首尾花括号之间）
    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or_else(|| rest.trim())
    } else {
        match (trimmed.find('{'), trimmed.rfind('}')) {
            (Some(start), Some(end)) if start < end => trimmed[start..=end].trim(),
            _ => return Ok(PlannerOutput::Response(trimmed.to_string())),
        }
    };

    // 报告等最终答案也可能带花括号；没有 "tool" 键就当普通文本
    if !json_str.contains("\"tool\"") {
        return Ok(PlannerOutput::Response(trimmed.to_string()));
    }

    let parsed: ToolCall =
        serde_json::from_str(json_str).map_err(|e| format!("{}: {}", e, json_str))?;

    if parsed.tool.is_empty() {
        Ok(PlannerOutput::Response(trimmed.to_string()))
    } else {
        Ok(PlannerOutput::ToolCall(parsed))
    }
}

/// Agent 执行器：持有共享 LLM 客户端与工具执行器，对任意 AgentSpec 可复用
pub struct AgentExecutor {
    llm: Arc<dyn LlmClient>,
    tools: ToolExecutor,
    max_steps: usize,
    llm_timeout: Duration,
}

impl AgentExecutor {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: ToolExecutor,
        max_steps: usize,
        llm_timeout: Duration,
    ) -> Self {
        Self {
            llm,
            tools,
            max_steps,
            llm_timeout,
        }
    }

    fn build_system_prompt(&self, agent: &AgentSpec, expected_output: &str) -> String {
        let tool_block = self.tools.prompt_block(&agent.tools);
        let tool_section = if tool_block.is_empty() {
            "(none)".to_string()
        } else {
            tool_block
        };
        format!(
            "You are {role}.\n\n\
             Goal: {goal}\n\n\
             Backstory: {backstory}\n\n\
             Available tools:\n{tools}\n\n\
             To use a tool, reply with exactly one JSON object and nothing else: \
             {{\"tool\": \"<name>\", \"args\": {{...}}}}.\n\
             When you have everything you need, reply with your final answer as plain text \
             (no JSON).\n\n\
             Expected output: {expected}",
            role = agent.role,
            goal = agent.goal,
            backstory = agent.backstory,
            tools = tool_section,
            expected = expected_output,
        )
    }

    /// 执行一个阶段：在往返预算内驱动 Plan/Act/Observe，返回 StageResult
    pub async fn run(
        &self,
        agent: &AgentSpec,
        prompt: &str,
        expected_output: &str,
        cancel: &CancellationToken,
    ) -> Result<StageResult, AgentError> {
        let system = self.build_system_prompt(agent, expected_output);
        let mut messages = vec![Message::system(system), Message::user(prompt.to_string())];
        let mut usage = UsageTotals::default();
        let mut tool_log: Vec<ToolInvocation> = Vec::new();

        for step in 0..self.max_steps {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            // 取消需中断在途请求，而不是等它完成或超时
            let completion = tokio::select! {
                _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                res = timeout(self.llm_timeout, self.llm.complete(&messages)) => res
                    .map_err(|_| {
                        AgentError::Llm("reasoning engine request timed out".to_string())
                    })?
                    .map_err(|e| AgentError::Llm(e.to_string()))?,
            };
            usage.add(completion.prompt_tokens, completion.completion_tokens);

            match parse_llm_output(&completion.text) {
                Ok(PlannerOutput::Response(text)) => {
                    // 最小形状校验：非空即可，expected_output 其余约束在 prompt 层
                    if text.trim().is_empty() {
                        return Err(AgentError::EmptyResult {
                            role: agent.role.clone(),
                        });
                    }
                    tracing::info!(role = %agent.role, steps = step + 1, "agent finished");
                    return Ok(StageResult {
                        text,
                        usage,
                        tool_calls: tool_log,
                    });
                }
                Ok(PlannerOutput::ToolCall(call)) => {
                    messages.push(Message::assistant(completion.text.clone()));

                    // 能力约束：声明集合之外的调用拒绝并记录，不执行
                    if !agent.allows(&call.tool) {
                        tracing::warn!(
                            role = %agent.role,
                            tool = %call.tool,
                            "tool call outside declared set, rejected"
                        );
                        tool_log.push(ToolInvocation::rejected(&call.tool, &call.args));
                        messages.push(Message::user(format!(
                            "Tool '{}' is not available to you. Available tools: {}. \
                             Continue with what you have.",
                            call.tool,
                            agent.tools.join(", ")
                        )));
                        continue;
                    }

                    let tool_result = tokio::select! {
                        _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                        res = self.tools.execute(&call.tool, call.args.clone()) => res,
                    };
                    match tool_result {
                        Ok(observation) => {
                            tool_log.push(ToolInvocation::succeeded(
                                &call.tool,
                                &call.args,
                                &observation,
                            ));
                            messages.push(Message::user(format!(
                                "Observation from `{}`:\n{}",
                                call.tool, observation
                            )));
                        }
                        Err(e) if e.is_fatal() => {
                            tool_log.push(ToolInvocation::failed(
                                &call.tool,
                                &call.args,
                                &e.to_string(),
                            ));
                            return Err(AgentError::FatalTool(e));
                        }
                        Err(e) => {
                            // 可恢复：让 LLM 跳过该输入继续
                            tool_log.push(ToolInvocation::failed(
                                &call.tool,
                                &call.args,
                                &e.to_string(),
                            ));
                            messages.push(Message::user(format!(
                                "Tool `{}` failed: {}. Skip this input and continue with \
                                 the rest.",
                                call.tool, e
                            )));
                        }
                    }
                }
                Err(parse_err) => {
                    // 格式错误：注入纠正提示重试，仍占用往返预算
                    messages.push(Message::assistant(completion.text.clone()));
                    messages.push(Message::user(format!(
                        "Your last reply looked like a tool call but was not valid JSON \
                         ({}). Reply with exactly one JSON tool call, or with your final \
                         answer as plain text.",
                        parse_err
                    )));
                }
            }
        }

        Err(AgentError::StepBudgetExhausted {
            steps: self.max_steps,
        })
    }
}
