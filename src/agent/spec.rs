//! Agent 定义：角色 / 目标 / 背景 / 可用工具
//!
//! 角色、目标与背景是运行时提供的 prompt 内容，不做类型层级；构建后不可变，
//! 每个角色一个实例，复用于其唯一阶段。工具集决定能力边界：
//! 检索者不能抓取，摘要者不能检索。

/// 一个角色的不可变配置
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    /// 允许调用的工具名集合（能力约束，执行时校验）
    pub tools: Vec<String>,
    pub allow_delegation: bool,
}

impl AgentSpec {
    pub fn new(
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
        tools: Vec<String>,
    ) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
            tools,
            allow_delegation: false,
        }
    }

    /// 该工具是否在 Agent 的声明集合内
    pub fn allows(&self, tool: &str) -> bool {
        self.tools.iter().any(|t| t == tool)
    }
}

/// 检索者：负责把主题换成候选 URL 列表
pub fn searcher_agent() -> AgentSpec {
    AgentSpec::new(
        "Expert Web Searcher",
        "Find the most relevant and up-to-date information on a given research topic.",
        "As a meticulous and efficient digital librarian, you excel at crafting precise \
         search queries and identifying the most credible and relevant sources from the \
         vast expanse of the internet. Your skills are crucial for laying the foundation \
         of any research task.",
        vec!["web_search".to_string()],
    )
}

/// 摘要者：抓取每个 URL 并产出按来源归属的摘要
pub fn summarizer_agent() -> AgentSpec {
    AgentSpec::new(
        "Content Summarization Specialist",
        "Scrape and distill the key information from web pages into concise, \
         easy-to-understand summaries.",
        "You are an expert analyst with a talent for cutting through the noise. You can \
         quickly read through dense web content, identify the core arguments and facts, \
         and present them in a clear and structured summary.",
        vec!["scrape".to_string()],
    )
}

/// 撰稿者：汇总摘要成带引用的研究报告
pub fn writer_agent() -> AgentSpec {
    AgentSpec::new(
        "Professional Report Writer",
        "Compose a comprehensive, well-structured, and properly cited research report \
         from the collected data.",
        "You are a skilled writer and editor, known for your ability to transform raw \
         data and summaries into polished, professional reports. Your work is \
         characterized by clarity, accuracy, and meticulous attention to detail, \
         including proper citations for all sources.",
        vec!["cite".to_string()],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_sets_are_disjoint() {
        let searcher = searcher_agent();
        let summarizer = summarizer_agent();
        let writer = writer_agent();
        assert!(searcher.allows("web_search"));
        assert!(!searcher.allows("scrape"));
        assert!(summarizer.allows("scrape"));
        assert!(!summarizer.allows("web_search"));
        assert!(writer.allows("cite"));
        assert!(!writer.allows("scrape"));
        assert!(!searcher.allow_delegation);
    }
}
