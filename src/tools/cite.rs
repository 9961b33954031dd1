//! cite 工具：为 URL 生成带访问时间戳的引用
//!
//! 纯函数、不会失败；时间戳取引用生成时刻（与抓取时刻的取舍见 DESIGN.md）。

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::{Tool, ToolError};

/// cite 工具：格式化 "[<url>] (Accessed on <timestamp>)"
pub struct CiteTool;

/// 生成引用行；格式固定，时间戳为调用时刻
pub fn format_citation(url: &str) -> String {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    format!("[{}] (Accessed on {})", url, timestamp)
}

#[async_trait]
impl Tool for CiteTool {
    fn name(&self) -> &str {
        "cite"
    }

    fn description(&self) -> &str {
        "Generate a citation line for a URL with the access timestamp. Args: {\"url\": \"https://...\"}."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": { "type": "string" }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let url = args.get("url").and_then(|v| v.as_str()).unwrap_or("").trim();
        if url.is_empty() {
            return Err(ToolError::BadArgs("Missing url".to_string()));
        }
        Ok(format_citation(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn citation_structure_is_deterministic() {
        let url = "https://example.org/report";
        let a = format_citation(url);
        let b = format_citation(url);
        assert!(a.starts_with("[https://example.org/report] (Accessed on "));
        assert!(a.ends_with(')'));
        // 同一 URL 的 URL 子串恒定；时间戳单调不减
        let ts = |s: &str| s.split("Accessed on ").nth(1).unwrap().trim_end_matches(')').to_string();
        assert!(ts(&b) >= ts(&a));
    }

    #[tokio::test]
    async fn missing_url_is_bad_args() {
        let err = CiteTool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::BadArgs(_)));
    }

    #[tokio::test]
    async fn execute_matches_pattern() {
        let out = CiteTool
            .execute(serde_json::json!({"url": "https://a.example/x"}))
            .await
            .unwrap();
        assert!(out.starts_with("[https://a.example/x] (Accessed on "));
    }
}
