//! 流水线集成测试
//!
//! 用脚本化 Mock LLM 与进程内工具跑整条链，覆盖执行顺序、用量聚合、
//! fail-fast 前缀保留、能力约束与部分抓取失败等场景。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use scout::agent::{AgentError, AgentExecutor, AgentSpec};
use scout::llm::{LlmClient, MockLlmClient};
use scout::pipeline::{Orchestrator, PipelineError, PipelineRun, RunStatus, Stage};
use scout::tools::{Tool, ToolError, ToolExecutor, ToolRegistry};

/// 固定 URL 列表的检索工具
struct FakeSearchTool {
    urls: Vec<String>,
}

#[async_trait]
impl Tool for FakeSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Return a fixed URL list."
    }

    async fn execute(&self, _args: Value) -> Result<String, ToolError> {
        Ok(self.urls.join("\n"))
    }
}

/// URL 含 "bad" 即失败（可恢复 Fetch 错误）的抓取工具
struct FlakyScrapeTool;

#[async_trait]
impl Tool for FlakyScrapeTool {
    fn name(&self) -> &str {
        "scrape"
    }

    fn description(&self) -> &str {
        "Scrape that fails for URLs containing 'bad'."
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let url = args.get("url").and_then(|v| v.as_str()).unwrap_or("");
        if url.contains("bad") {
            return Err(ToolError::Fetch {
                url: url.to_string(),
                cause: "connect timeout".to_string(),
            });
        }
        Ok(format!("content of {}", url))
    }
}

/// 统计执行次数的工具，用于验证未授权调用从不落地
struct CountingTool {
    count: Arc<AtomicUsize>,
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        "counting"
    }

    fn description(&self) -> &str {
        "Counts executions."
    }

    async fn execute(&self, _args: Value) -> Result<String, ToolError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok("counted".to_string())
    }
}

/// 始终致命失败的检索工具
struct DeadSearchTool;

#[async_trait]
impl Tool for DeadSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search whose provider is unreachable."
    }

    async fn execute(&self, _args: Value) -> Result<String, ToolError> {
        Err(ToolError::SearchUnavailable("dns failure".to_string()))
    }
}

fn orchestrator(llm: Arc<dyn LlmClient>, registry: ToolRegistry) -> Orchestrator {
    let tools = ToolExecutor::new(registry, 5);
    Orchestrator::new(AgentExecutor::new(llm, tools, 12, Duration::from_secs(5)))
}

fn agent(role: &str, tools: Vec<&str>) -> Arc<AgentSpec> {
    Arc::new(AgentSpec::new(
        role,
        "goal",
        "backstory",
        tools.into_iter().map(String::from).collect(),
    ))
}

fn stage(id: &str, agent: Arc<AgentSpec>, deps: &[&str]) -> Stage {
    Stage {
        id: id.to_string(),
        description: format!("Work on {}", id),
        expected_output: "non-empty text".to_string(),
        agent,
        depends_on: deps.iter().map(|s| s.to_string()).collect(),
    }
}

#[tokio::test]
async fn stages_run_in_declared_order_and_usage_aggregates() {
    let llm = Arc::new(MockLlmClient::scripted(["out-a", "out-b", "out-c"]));
    let orch = orchestrator(llm, ToolRegistry::new());

    let a = agent("A", vec![]);
    let stages = vec![
        stage("a", a.clone(), &[]),
        stage("b", a.clone(), &["a"]),
        stage("c", a, &["b"]),
    ];
    let mut run = PipelineRun::new(stages);
    let outcome = orch
        .execute(&mut run, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Succeeded);
    assert_eq!(outcome.final_text, "out-c");
    assert_eq!(run.result("a").unwrap().text, "out-a");
    assert_eq!(run.result("b").unwrap().text, "out-b");
    // 每次请求记 10/5，三个阶段各一次往返
    assert_eq!(run.aggregate.prompt_tokens, 30);
    assert_eq!(run.aggregate.completion_tokens, 15);
    assert_eq!(outcome.usage, run.aggregate);
    // 分阶段统计按声明顺序输出
    let ids: Vec<_> = outcome.metrics.stages.iter().map(|s| s.stage.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn zero_stages_means_zero_usage() {
    let llm = Arc::new(MockLlmClient::scripted(Vec::<String>::new()));
    let orch = orchestrator(llm, ToolRegistry::new());
    let mut run = PipelineRun::new(vec![]);
    let outcome = orch
        .execute(&mut run, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Succeeded);
    assert_eq!(outcome.usage.total(), 0);
    assert!(outcome.final_text.is_empty());
}

#[tokio::test]
async fn failed_stage_keeps_completed_prefix_only() {
    // 第二阶段回空文本，未通过最小形状校验
    let llm = Arc::new(MockLlmClient::scripted(["out-a", "   "]));
    let orch = orchestrator(llm, ToolRegistry::new());

    let a = agent("A", vec![]);
    let stages = vec![
        stage("a", a.clone(), &[]),
        stage("b", a.clone(), &["a"]),
        stage("c", a, &["b"]),
    ];
    let mut run = PipelineRun::new(stages);
    let err = orch
        .execute(&mut run, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.results.len(), 1);
    assert!(run.result("a").is_some());
    assert!(run.result("b").is_none());
    assert!(run.result("c").is_none());
    match err {
        PipelineError::StageFailed { stage, source, usage } => {
            assert_eq!(stage, "b");
            assert!(matches!(source, AgentError::EmptyResult { .. }));
            // 部分用量只含已完成的阶段 a
            assert_eq!(usage.prompt_tokens, 10);
            assert_eq!(usage.completion_tokens, 5);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn unreachable_engine_fails_first_stage_with_zero_usage() {
    let llm = Arc::new(MockLlmClient::unreachable());
    let orch = orchestrator(llm, ToolRegistry::new());

    let a = agent("A", vec![]);
    let mut run = PipelineRun::new(vec![stage("a", a.clone(), &[]), stage("b", a, &["a"])]);
    let err = orch
        .execute(&mut run, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.results.is_empty());
    match err {
        PipelineError::StageFailed { stage, source, usage } => {
            assert_eq!(stage, "a");
            assert!(matches!(source, AgentError::Llm(_)));
            assert_eq!(usage.total(), 0);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn partial_scrape_failures_do_not_fail_the_run() {
    // 7 个 URL 中 2 个失败：Agent 跳过失败项，用其余 5 个完成摘要
    let urls: Vec<String> = vec![
        "https://ok1.example",
        "https://bad1.example",
        "https://ok2.example",
        "https://ok3.example",
        "https://bad2.example",
        "https://ok4.example",
        "https://ok5.example",
    ]
    .into_iter()
    .map(String::from)
    .collect();

    let mut script: Vec<String> = urls
        .iter()
        .map(|u| format!(r#"{{"tool": "scrape", "args": {{"url": "{}"}}}}"#, u))
        .collect();
    script.push(
        "Summaries:\n- https://ok1.example: ...\n- https://ok2.example: ...\n\
         - https://ok3.example: ...\n- https://ok4.example: ...\n- https://ok5.example: ..."
            .to_string(),
    );

    let llm = Arc::new(MockLlmClient::scripted(script));
    let mut registry = ToolRegistry::new();
    registry.register(FlakyScrapeTool);
    let orch = orchestrator(llm, registry);

    let summarizer = agent("Summarizer", vec!["scrape"]);
    let mut run = PipelineRun::new(vec![stage("summarize", summarizer, &[])]);
    let outcome = orch
        .execute(&mut run, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Succeeded);
    assert!(outcome.final_text.contains("ok5.example"));
    let result = run.result("summarize").unwrap();
    assert_eq!(result.tool_calls.len(), 7);
    let failed = result.tool_calls.iter().filter(|c| !c.ok).count();
    assert_eq!(failed, 2);
}

#[tokio::test]
async fn fatal_tool_error_fails_the_stage() {
    let script = vec![r#"{"tool": "web_search", "args": {"query": "anything"}}"#];
    let llm = Arc::new(MockLlmClient::scripted(script));
    let mut registry = ToolRegistry::new();
    registry.register(DeadSearchTool);
    let orch = orchestrator(llm, registry);

    let searcher = agent("Searcher", vec!["web_search"]);
    let mut run = PipelineRun::new(vec![stage("search", searcher, &[])]);
    let err = orch
        .execute(&mut run, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.results.is_empty());
    assert!(matches!(
        err,
        PipelineError::StageFailed {
            source: AgentError::FatalTool(ToolError::SearchUnavailable(_)),
            ..
        }
    ));
}

#[tokio::test]
async fn undeclared_tool_is_rejected_and_never_executed() {
    let count = Arc::new(AtomicUsize::new(0));
    let script = vec![
        r#"{"tool": "counting", "args": {}}"#.to_string(),
        "Finished without that tool.".to_string(),
    ];
    let llm = Arc::new(MockLlmClient::scripted(script));
    let mut registry = ToolRegistry::new();
    registry.register(CountingTool {
        count: count.clone(),
    });
    let orch = orchestrator(llm, registry);

    // counting 已注册但不在该 Agent 的声明集合内
    let writer = agent("Writer", vec!["cite"]);
    let mut run = PipelineRun::new(vec![stage("write", writer, &[])]);
    let outcome = orch
        .execute(&mut run, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(outcome.final_text, "Finished without that tool.");
    let calls = &run.result("write").unwrap().tool_calls;
    assert_eq!(calls.len(), 1);
    assert!(!calls[0].ok);
    assert!(calls[0].outcome.contains("not available"));
}

#[tokio::test]
async fn upstream_output_flows_into_downstream_prompt() {
    // 搜索阶段调工具得到 URL 列表并照抄为结果；摘要阶段应在 prompt 中看到它。
    // Mock LLM 不读 prompt，这里通过链成功 + 结果文本验证数据流转。
    let urls = vec!["https://a.example".to_string(), "https://b.example".to_string()];
    let script = vec![
        r#"{"tool": "web_search", "args": {"query": "topic"}}"#.to_string(),
        "https://a.example\nhttps://b.example".to_string(),
        "- https://a.example: summary A\n- https://b.example: summary B".to_string(),
    ];
    let llm = Arc::new(MockLlmClient::scripted(script));
    let mut registry = ToolRegistry::new();
    registry.register(FakeSearchTool { urls });
    let orch = orchestrator(llm, registry);

    let searcher = agent("Searcher", vec!["web_search"]);
    let summarizer = agent("Summarizer", vec![]);
    let mut run = PipelineRun::new(vec![
        stage("search", searcher, &[]),
        stage("summarize", summarizer, &["search"]),
    ]);
    let outcome = orch
        .execute(&mut run, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Succeeded);
    let search_result = run.result("search").unwrap();
    assert_eq!(search_result.tool_calls.len(), 1);
    assert!(search_result.text.contains("https://b.example"));
    assert!(outcome.final_text.contains("summary B"));
}

#[tokio::test]
async fn step_budget_exhaustion_fails_the_stage() {
    // 脚本永远吐工具调用，从不给最终答案
    let script: Vec<String> = (0..20)
        .map(|_| r#"{"tool": "counting", "args": {}}"#.to_string())
        .collect();
    let llm = Arc::new(MockLlmClient::scripted(script));
    let mut registry = ToolRegistry::new();
    registry.register(CountingTool {
        count: Arc::new(AtomicUsize::new(0)),
    });
    let orch = orchestrator(llm, registry);

    let looper = agent("Looper", vec!["counting"]);
    let mut run = PipelineRun::new(vec![stage("loop", looper, &[])]);
    let err = orch
        .execute(&mut run, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::StageFailed {
            source: AgentError::StepBudgetExhausted { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn cancelled_token_aborts_before_any_stage() {
    let llm = Arc::new(MockLlmClient::scripted(["never used"]));
    let orch = orchestrator(llm, ToolRegistry::new());

    let a = agent("A", vec![]);
    let mut run = PipelineRun::new(vec![stage("a", a, &[])]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = orch.execute(&mut run, &cancel).await.unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled { .. }));
    assert!(run.results.is_empty());
    assert_eq!(run.status, RunStatus::Failed);
}
