//! Agent 层：角色定义与有界执行循环

pub mod executor;
pub mod spec;

pub use executor::{parse_llm_output, AgentError, AgentExecutor, PlannerOutput, ToolCall};
pub use spec::{searcher_agent, summarizer_agent, writer_agent, AgentSpec};
