//! 工具错误类型
//!
//! 区分可恢复与致命两类：单个 URL 抓取失败、解析失败、超时等可由 Agent 绕过
//! （跳过该输入继续），检索后端整体不可达则升级为阶段失败。

use thiserror::Error;

/// 单次工具调用的错误
#[derive(Debug, Error)]
pub enum ToolError {
    /// 检索后端不可达（致命：没有 URL 就没有后续阶段）
    #[error("Search provider unreachable: {0}")]
    SearchUnavailable(String),

    /// 单个 URL 网络 / HTTP 失败（可恢复）
    #[error("Fetch failed for {url}: {cause}")]
    Fetch { url: String, cause: String },

    /// 内容无法提取为文本（可恢复）
    #[error("Could not extract text from {url}")]
    Parse { url: String },

    /// 工具调用超时（可恢复）
    #[error("Tool timeout: {0}")]
    Timeout(String),

    /// 参数缺失或格式错误（可恢复：提示 LLM 修正后重试）
    #[error("Bad tool arguments: {0}")]
    BadArgs(String),

    /// 未注册的工具名
    #[error("Unknown tool: {0}")]
    Unknown(String),
}

impl ToolError {
    /// 致命错误直接终止所在阶段；可恢复错误作为 Observation 回给 LLM 绕行
    pub fn is_fatal(&self) -> bool {
        matches!(self, ToolError::SearchUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatality_split() {
        assert!(ToolError::SearchUnavailable("down".into()).is_fatal());
        assert!(!ToolError::Fetch {
            url: "https://a".into(),
            cause: "timeout".into()
        }
        .is_fatal());
        assert!(!ToolError::Parse {
            url: "https://a".into()
        }
        .is_fatal());
        assert!(!ToolError::Timeout("scrape".into()).is_fatal());
    }
}
