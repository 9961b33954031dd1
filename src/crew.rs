//! Run Driver：为给定主题构建三个 Agent 与三阶段链并驱动编排器
//!
//! search -> summarize -> write 的固定链；主题与时间窗口在构建时代入指令模板。
//! 工具注册表包含全部三个工具，能力边界由各 AgentSpec 的声明集合裁剪。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::agent::{searcher_agent, summarizer_agent, writer_agent, AgentExecutor, AgentSpec};
use crate::config::AppConfig;
use crate::llm::LlmClient;
use crate::pipeline::{Orchestrator, PipelineError, PipelineRun, RunOutcome, Stage};
use crate::tools::{CiteTool, ScrapeTool, ToolExecutor, ToolRegistry, WebSearchTool};

/// 研究团队：三个角色 + 编排器，一次构建可跑多个主题
pub struct ResearchCrew {
    orchestrator: Orchestrator,
    searcher: Arc<AgentSpec>,
    summarizer: Arc<AgentSpec>,
    writer: Arc<AgentSpec>,
}

impl ResearchCrew {
    pub fn new(llm: Arc<dyn LlmClient>, cfg: &AppConfig) -> Self {
        let mut registry = ToolRegistry::new();
        registry.register(WebSearchTool::new(
            cfg.tools.search.timeout_secs,
            cfg.tools.search.max_results,
        ));
        registry.register(ScrapeTool::new(
            cfg.tools.scrape.timeout_secs,
            cfg.tools.scrape.max_result_chars,
            cfg.tools.scrape.max_concurrent,
        ));
        registry.register(CiteTool);

        let tools = ToolExecutor::new(registry, cfg.tools.tool_timeout_secs);
        let agents = AgentExecutor::new(
            llm,
            tools,
            cfg.pipeline.max_agent_steps,
            Duration::from_secs(cfg.llm.timeouts.request),
        );

        Self {
            orchestrator: Orchestrator::new(agents),
            searcher: Arc::new(searcher_agent()),
            summarizer: Arc::new(summarizer_agent()),
            writer: Arc::new(writer_agent()),
        }
    }

    /// 为主题构建三阶段链（声明顺序即执行顺序）
    pub fn build_stages(&self, topic: &str, time_window: Option<&str>) -> Vec<Stage> {
        let window_clause = match time_window {
            Some(w) if !w.trim().is_empty() => {
                format!("Focus on results from this period: {}. ", w.trim())
            }
            _ => String::new(),
        };

        let search = Stage {
            id: "search".to_string(),
            description: format!(
                "Search the web for credible and relevant information on the topic: \
                 '{}'. {}Compile a list of the top 5-7 most promising URLs, one per line.",
                topic, window_clause
            ),
            expected_output: "A list of 5-7 relevant URLs, one per line.".to_string(),
            agent: self.searcher.clone(),
            depends_on: vec![],
        };

        let summarize = Stage {
            id: "summarize".to_string(),
            description: "For each URL provided by the searcher, scrape the content and \
                          create a concise summary. Focus on extracting key facts, figures, \
                          and main arguments. Keep every summary attributed to its source \
                          URL; if a page cannot be fetched, skip it and summarize the rest."
                .to_string(),
            expected_output: "A compiled list of summaries, each labeled with its source URL."
                .to_string(),
            agent: self.summarizer.clone(),
            depends_on: vec!["search".to_string()],
        };

        let write = Stage {
            id: "write".to_string(),
            description: format!(
                "Using the provided summaries and URLs, write a comprehensive research \
                 report on the topic: '{}'. The report should have an executive summary, \
                 a body with key findings (in bullet points), and a conclusion. Ensure \
                 every piece of information is attributed to its source by generating a \
                 citation with the cite tool for each URL used. Cite only URLs that \
                 appear in the summaries. The final output should be a well-formatted \
                 Markdown document.",
                topic
            ),
            expected_output: format!(
                "A structured research report on '{}' in Markdown format, complete with \
                 an executive summary, key findings, and citations.",
                topic
            ),
            agent: self.writer.clone(),
            depends_on: vec!["summarize".to_string()],
        };

        vec![search, summarize, write]
    }

    /// 跑一个主题：构建链、执行、返回产物；run 的结果与状态留在内部即弃
    pub async fn run(
        &self,
        topic: &str,
        time_window: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, PipelineError> {
        let mut run = PipelineRun::new(self.build_stages(topic, time_window));
        self.orchestrator.execute(&mut run, cancel).await
    }
}
