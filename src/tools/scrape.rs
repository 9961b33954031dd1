//! scrape 工具：抓取 URL 并提取可读文本
//!
//! GET 请求带超时与 User-Agent；对 HTML 响应使用 html2text 提取可读文本，
//! 失败时回退到简易去标签，绝不因畸形 HTML 报错。响应超过 max_result_chars
//! 时截断并追加 ...[truncated]。支持批量模式 {"urls": [...]}：有界并发抓取，
//! 每条结果按来源 URL 归属，部分失败内联上报，全部失败才算错误。

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use html2text::from_read;
use reqwest::Client;
use serde_json::Value;

use crate::tools::{Tool, ToolError};

/// scrape 工具：单 URL 或批量抓取，输出按 URL 标注的正文文本
pub struct ScrapeTool {
    client: Client,
    max_result_chars: usize,
    max_concurrent: usize,
}

/// 简易去除 HTML 标签（html2text 失败时的回退）
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut prev_whitespace = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => {
                let is_whitespace = c.is_whitespace();
                if is_whitespace && prev_whitespace {
                    continue;
                }
                prev_whitespace = is_whitespace;
                out.push(if is_whitespace { ' ' } else { c });
            }
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ").trim().to_string()
}

/// 判断内容是否像 HTML（需提取可读文本）
fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("<!")
        || s.starts_with("<html")
        || s.starts_with("<HTML")
        || (s.len() > 20
            && s.contains('<')
            && (s.contains("</") || s.contains("<meta") || s.contains("<head") || s.contains("<title")))
}

impl ScrapeTool {
    pub fn new(timeout_secs: u64, max_result_chars: usize, max_concurrent: usize) -> Self {
        // 使用现代浏览器 UA 与常用请求头，避免被站点识别为爬虫
        const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .default_headers({
                use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
                let mut h = reqwest::header::HeaderMap::new();
                h.insert(
                    ACCEPT,
                    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
                        .parse()
                        .unwrap(),
                );
                h.insert(ACCEPT_LANGUAGE, "en-US,en;q=0.9".parse().unwrap());
                h
            })
            .build()
            .unwrap_or_default();
        Self {
            client,
            max_result_chars,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// 将 HTML 转为可读文本（去除 script/style 等）
    fn html_to_text(&self, html: &str) -> String {
        match from_read(html.as_bytes(), 120) {
            Ok(text) if !text.trim().is_empty() => text,
            _ => strip_html_tags(html),
        }
    }

    /// 抓取单个 URL 并提取正文；网络/HTTP 失败为 Fetch，提取不出文本为 Parse
    pub async fn fetch(&self, url: &str) -> Result<String, ToolError> {
        let url = url.trim();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::BadArgs(format!("Not an http(s) URL: {}", url)));
        }

        let resp = self.client.get(url).send().await.map_err(|e| ToolError::Fetch {
            url: url.to_string(),
            cause: e.to_string(),
        })?;
        if !resp.status().is_success() {
            return Err(ToolError::Fetch {
                url: url.to_string(),
                cause: format!("HTTP {}", resp.status()),
            });
        }
        let mut body = resp.text().await.map_err(|e| ToolError::Fetch {
            url: url.to_string(),
            cause: format!("read body: {}", e),
        })?;

        // 去除 BOM，避免 HTML 检测失败
        if body.starts_with('\u{FEFF}') {
            body = strip_bom(&body).to_string();
        }

        let body = if looks_like_html(&body) {
            self.html_to_text(&body)
        } else {
            body
        };

        if body.trim().is_empty() {
            return Err(ToolError::Parse {
                url: url.to_string(),
            });
        }

        Ok(truncate_chars(&body, self.max_result_chars))
    }

    /// 批量抓取：有界并发，逐 URL 归属结果；全部失败时返回最后一个错误
    pub async fn fetch_many(&self, urls: Vec<String>) -> Result<String, ToolError> {
        if urls.is_empty() {
            return Err(ToolError::BadArgs("Empty urls list".to_string()));
        }

        let mut outcomes: Vec<(usize, String, Result<String, ToolError>)> =
            stream::iter(urls.into_iter().enumerate())
                .map(|(idx, url)| async move {
                    let outcome = self.fetch(&url).await;
                    (idx, url, outcome)
                })
                .buffer_unordered(self.max_concurrent)
                .collect()
                .await;
        // buffer_unordered 打乱完成顺序，按原始顺序恢复归属
        outcomes.sort_by_key(|(idx, _, _)| *idx);

        let mut sections = Vec::new();
        let mut ok_count = 0usize;
        let mut last_err = None;
        for (_, url, outcome) in outcomes {
            match outcome {
                Ok(text) => {
                    ok_count += 1;
                    sections.push(format!("=== {} ===\n{}", url, text));
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "scrape failed, skipping");
                    sections.push(format!("=== {} ===\n[unavailable: {}]", url, e));
                    last_err = Some(e);
                }
            }
        }

        if ok_count == 0 {
            // 所有输入都失败：对本阶段而言这不是可绕过的局部故障
            return Err(last_err.unwrap_or_else(|| ToolError::BadArgs("no urls".to_string())));
        }

        Ok(sections.join("\n\n"))
    }
}

/// 去除开头的 UTF-8 BOM（U+FEFF，可能重复出现，需按完整字符剥离）
fn strip_bom(s: &str) -> &str {
    s.trim_start_matches('\u{FEFF}')
}

/// 按字符数截断，超限追加 ...[truncated]
fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        s.chars().take(max).collect::<String>() + "\n...[truncated]"
    } else {
        s.to_string()
    }
}

#[async_trait]
impl Tool for ScrapeTool {
    fn name(&self) -> &str {
        "scrape"
    }

    fn description(&self) -> &str {
        "Fetch one or more web pages and extract their readable text, labeled per source URL. Args: {\"url\": \"https://...\"} or {\"urls\": [\"https://...\", ...]}."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": { "type": "string" },
                "urls": { "type": "array", "items": { "type": "string" } }
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        if let Some(urls) = args.get("urls").and_then(|v| v.as_array()) {
            let urls: Vec<String> = urls
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect();
            tracing::info!(count = urls.len(), "scrape batch");
            return self.fetch_many(urls).await;
        }

        let url = args.get("url").and_then(|v| v.as_str()).unwrap_or("").trim();
        if url.is_empty() {
            return Err(ToolError::BadArgs("Missing url".to_string()));
        }
        tracing::info!(url = %url, "scrape");
        self.fetch(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_detection() {
        assert!(looks_like_html("<!DOCTYPE html><html><body>hi</body></html>"));
        assert!(looks_like_html("  <html lang=\"en\"><head><title>t</title></head>"));
        assert!(!looks_like_html("plain text without markup"));
        assert!(!looks_like_html("{\"json\": true}"));
    }

    #[test]
    fn strip_tags_degrades_gracefully() {
        // 畸形 HTML 也不应 panic
        let text = strip_html_tags("<p>Solar <b>power</b> grew <unclosed");
        assert_eq!(text, "Solar power grew");
    }

    #[test]
    fn bom_is_stripped_as_whole_chars() {
        // BOM 是 3 字节字符，按字节切片会在字符边界上 panic
        assert_eq!(strip_bom("\u{FEFF}<html>hi</html>"), "<html>hi</html>");
        assert_eq!(strip_bom("\u{FEFF}\u{FEFF}<html>hi</html>"), "<html>hi</html>");
        assert_eq!(strip_bom("no bom"), "no bom");
        assert!(looks_like_html(strip_bom("\u{FEFF}\u{FEFF}<!DOCTYPE html><html>")));
    }

    #[test]
    fn truncation_appends_marker() {
        let long = "a".repeat(100);
        let out = truncate_chars(&long, 10);
        assert!(out.starts_with("aaaaaaaaaa"));
        assert!(out.ends_with("...[truncated]"));
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[tokio::test]
    async fn non_http_url_is_bad_args() {
        let tool = ScrapeTool::new(5, 1000, 2);
        let err = tool.fetch("ftp://example.org/file").await.unwrap_err();
        assert!(matches!(err, ToolError::BadArgs(_)));
    }

    #[tokio::test]
    async fn empty_batch_is_bad_args() {
        let tool = ScrapeTool::new(5, 1000, 2);
        let err = tool.fetch_many(Vec::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::BadArgs(_)));
    }
}
