//! web_search 工具：主题查询 -> URL 列表
//!
//! 通过 DuckDuckGo instant-answer API（免 Key）取 Results / RelatedTopics 中的
//! FirstURL；空查询或无结果返回空列表而非错误，后端不可达为致命错误
//! （SearchUnavailable，没有 URL 则后续阶段无从谈起）。

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::tools::{Tool, ToolError};

/// web_search 工具：查询字符串（可选时间窗口）换 URL 列表
pub struct WebSearchTool {
    client: Client,
    max_results: usize,
}

impl WebSearchTool {
    pub fn new(timeout_secs: u64, max_results: usize) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent("scout/0.1")
            .build()
            .unwrap_or_default();
        Self {
            client,
            max_results,
        }
    }

    /// 查询并返回 URL 列表；空查询与零命中都返回空 Vec
    pub async fn search(
        &self,
        query: &str,
        time_window: Option<&str>,
    ) -> Result<Vec<String>, ToolError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let full_query = match time_window {
            Some(window) if !window.trim().is_empty() => format!("{} {}", query, window.trim()),
            _ => query.to_string(),
        };

        let url = format!(
            "https://api.duckduckgo.com/?q={}&format=json&no_html=1&skip_disambig=1",
            urlencoding::encode(&full_query)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ToolError::SearchUnavailable(e.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ToolError::SearchUnavailable(format!("bad response: {}", e)))?;

        Ok(extract_result_urls(&body, self.max_results))
    }
}

/// 从 instant-answer 响应中收集 URL：AbstractURL、Results[].FirstURL、
/// RelatedTopics[].FirstURL（含嵌套 Topics），去重并截断到 max 条
fn extract_result_urls(body: &Value, max: usize) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();

    let mut push = |url: &str| {
        let url = url.trim();
        if !url.is_empty() && !urls.iter().any(|u| u == url) && urls.len() < max {
            urls.push(url.to_string());
        }
    };

    if let Some(url) = body.get("AbstractURL").and_then(|v| v.as_str()) {
        push(url);
    }

    if let Some(results) = body.get("Results").and_then(|v| v.as_array()) {
        for item in results {
            if let Some(url) = item.get("FirstURL").and_then(|v| v.as_str()) {
                push(url);
            }
        }
    }

    if let Some(topics) = body.get("RelatedTopics").and_then(|v| v.as_array()) {
        for topic in topics {
            if let Some(url) = topic.get("FirstURL").and_then(|v| v.as_str()) {
                push(url);
            }
            // 分组条目把真正的结果嵌在 Topics 里
            if let Some(nested) = topic.get("Topics").and_then(|v| v.as_array()) {
                for item in nested {
                    if let Some(url) = item.get("FirstURL").and_then(|v| v.as_str()) {
                        push(url);
                    }
                }
            }
        }
    }

    urls
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for a query and return a list of result URLs, one per line. Args: {\"query\": \"...\", \"time_window\": \"2022-2024\" (optional)}."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "time_window": { "type": "string" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let query = args.get("query").and_then(|v| v.as_str()).unwrap_or("");
        let time_window = args.get("time_window").and_then(|v| v.as_str());

        tracing::info!(query = %query, "web_search");
        let urls = self.search(query, time_window).await?;
        if urls.is_empty() {
            return Ok("No results found.".to_string());
        }
        Ok(urls.join("\n"))
    }
}
