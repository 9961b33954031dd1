//! 顺序编排器
//!
//! 按声明顺序逐阶段执行（链式依赖下声明顺序即拓扑序）：为每个阶段拼接
//! 带来源标注的上游输出，交给 Agent 执行器；成功则落结果并累加用量，
//! 失败立即终止（fail-fast），后续阶段不执行，results 只保留已完成前缀。
//! 下游（撰稿）依赖上游完整产出，缺失的摘要意味着凭空编造的引用，
//! 因此不做 best-effort 续跑。

use tokio_util::sync::CancellationToken;

use crate::agent::{AgentError, AgentExecutor};
use crate::pipeline::error::PipelineError;
use crate::pipeline::types::{
    PipelineRun, RunMetrics, RunStatus, Stage, StageMetrics, UsageTotals,
};

/// 一次成功运行的产物：末阶段文本 + 聚合用量 + 分阶段统计
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub final_text: String,
    pub usage: UsageTotals,
    pub metrics: RunMetrics,
}

/// 顺序编排器：持有 Agent 执行器，驱动 PipelineRun
pub struct Orchestrator {
    agents: AgentExecutor,
}

impl Orchestrator {
    pub fn new(agents: AgentExecutor) -> Self {
        Self { agents }
    }

    /// 执行整条阶段链；run 保留结果与状态供调用方检视
    pub async fn execute(
        &self,
        run: &mut PipelineRun,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, PipelineError> {
        validate_chain(&run.stages)?;
        run.status = RunStatus::Running;

        let stages = run.stages.clone();
        for stage in &stages {
            if cancel.is_cancelled() {
                run.status = RunStatus::Failed;
                return Err(PipelineError::Cancelled {
                    usage: run.aggregate,
                });
            }

            let prompt = build_stage_prompt(stage, run);
            tracing::info!(stage = %stage.id, role = %stage.agent.role, "stage start");

            match self
                .agents
                .run(&stage.agent, &prompt, &stage.expected_output, cancel)
                .await
            {
                Ok(result) => {
                    // 聚合用量只在阶段完整结束后更新，保持「已完成之和」不变式
                    run.aggregate.merge(result.usage);
                    tracing::info!(
                        stage = %stage.id,
                        prompt_tokens = result.usage.prompt_tokens,
                        completion_tokens = result.usage.completion_tokens,
                        tool_calls = result.tool_calls.len(),
                        "stage completed"
                    );
                    run.results.insert(stage.id.clone(), result);
                }
                Err(AgentError::Cancelled) => {
                    run.status = RunStatus::Failed;
                    return Err(PipelineError::Cancelled {
                        usage: run.aggregate,
                    });
                }
                Err(e) => {
                    run.status = RunStatus::Failed;
                    tracing::error!(stage = %stage.id, error = %e, "stage failed, aborting run");
                    return Err(PipelineError::StageFailed {
                        stage: stage.id.clone(),
                        source: e,
                        usage: run.aggregate,
                    });
                }
            }
        }

        run.status = RunStatus::Succeeded;
        let final_text = stages
            .last()
            .and_then(|s| run.results.get(&s.id))
            .map(|r| r.text.clone())
            .unwrap_or_default();

        Ok(RunOutcome {
            final_text,
            usage: run.aggregate,
            metrics: build_metrics(run),
        })
    }
}

/// 校验阶段链：ID 唯一，且每个依赖都指向更早声明的阶段
/// （声明顺序必须是依赖图的拓扑序；链情形即「依赖在前」）
fn validate_chain(stages: &[Stage]) -> Result<(), PipelineError> {
    let mut seen: Vec<&str> = Vec::new();
    for stage in stages {
        if seen.contains(&stage.id.as_str()) {
            return Err(PipelineError::InvalidChain(format!(
                "duplicate stage id '{}'",
                stage.id
            )));
        }
        for dep in &stage.depends_on {
            if !seen.contains(&dep.as_str()) {
                return Err(PipelineError::InvalidChain(format!(
                    "stage '{}' depends on '{}' which is not declared before it",
                    stage.id, dep
                )));
            }
        }
        seen.push(&stage.id);
    }
    Ok(())
}

/// 拼接阶段 prompt：指令 + 每个依赖的输出，逐条标注来源阶段与角色。
/// 保留来源归属（不摊平成一团），撰稿阶段的引用正确性依赖于此。
fn build_stage_prompt(stage: &Stage, run: &PipelineRun) -> String {
    let mut prompt = stage.description.clone();
    if stage.depends_on.is_empty() {
        return prompt;
    }

    prompt.push_str("\n\n# Context from upstream stages\n");
    for dep in &stage.depends_on {
        if let Some(result) = run.results.get(dep) {
            let role = run
                .stages
                .iter()
                .find(|s| &s.id == dep)
                .map(|s| s.agent.role.as_str())
                .unwrap_or("unknown");
            prompt.push_str(&format!(
                "\n## Output of stage `{}` ({})\n\n{}\n",
                dep, role, result.text
            ));
        }
    }
    prompt
}

/// 汇总分阶段与整体用量（按声明顺序输出）
fn build_metrics(run: &PipelineRun) -> RunMetrics {
    let stages = run
        .stages
        .iter()
        .filter_map(|s| {
            run.results.get(&s.id).map(|r| StageMetrics {
                stage: s.id.clone(),
                role: s.agent.role.clone(),
                prompt_tokens: r.usage.prompt_tokens,
                completion_tokens: r.usage.completion_tokens,
                tool_calls: r.tool_calls.len(),
            })
        })
        .collect();

    RunMetrics {
        run_id: run.id.clone(),
        status: run.status,
        prompt_tokens: run.aggregate.prompt_tokens,
        completion_tokens: run.aggregate.completion_tokens,
        total_tokens: run.aggregate.total(),
        stages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentSpec;
    use crate::pipeline::types::{StageResult, UsageTotals};
    use std::sync::Arc;

    fn stage(id: &str, deps: &[&str]) -> Stage {
        Stage {
            id: id.to_string(),
            description: format!("Do {}", id),
            expected_output: "text".to_string(),
            agent: Arc::new(AgentSpec::new(
                format!("{} role", id),
                "goal",
                "story",
                vec![],
            )),
            depends_on: deps.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn chain_in_topological_order_is_valid() {
        let stages = vec![stage("a", &[]), stage("b", &["a"]), stage("c", &["b"])];
        assert!(validate_chain(&stages).is_ok());
    }

    #[test]
    fn forward_dependency_is_rejected() {
        let stages = vec![stage("a", &["b"]), stage("b", &[])];
        let err = validate_chain(&stages).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidChain(_)));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let stages = vec![stage("a", &[]), stage("b", &["missing"])];
        assert!(validate_chain(&stages).is_err());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let stages = vec![stage("a", &[]), stage("a", &[])];
        assert!(validate_chain(&stages).is_err());
    }

    #[test]
    fn stage_prompt_tags_provenance() {
        let stages = vec![stage("search", &[]), stage("summarize", &["search"])];
        let mut run = PipelineRun::new(stages);
        run.results.insert(
            "search".to_string(),
            StageResult {
                text: "https://example.org/a\nhttps://example.org/b".to_string(),
                usage: UsageTotals::default(),
                tool_calls: vec![],
            },
        );
        let summarize = run.stages[1].clone();
        let prompt = build_stage_prompt(&summarize, &run);
        assert!(prompt.starts_with("Do summarize"));
        assert!(prompt.contains("## Output of stage `search` (search role)"));
        assert!(prompt.contains("https://example.org/b"));
    }

    #[test]
    fn stage_without_deps_gets_bare_prompt() {
        let stages = vec![stage("search", &[])];
        let run = PipelineRun::new(stages);
        let prompt = build_stage_prompt(&run.stages[0].clone(), &run);
        assert_eq!(prompt, "Do search");
    }
}
