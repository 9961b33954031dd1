//! 报告与用量日志落盘
//!
//! 成功后写两个文件：reports/<slug>_<时间戳>.<format> 与
//! logs/<slug>_<时间戳>_log.json；编排失败时不写任何报告文件。

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::pipeline::RunMetrics;

/// 主题转文件名 slug：小写、空格转下划线、截到 30 字符
pub fn slugify_topic(topic: &str) -> String {
    topic
        .trim()
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .take(30)
        .collect()
}

/// 已写出的文件路径
#[derive(Debug)]
pub struct SavedArtifacts {
    pub report: PathBuf,
    pub log: PathBuf,
}

/// 写出报告与 JSON 用量日志；目录不存在则创建
pub fn save_outputs(
    base: &Path,
    topic: &str,
    format_ext: &str,
    report_text: &str,
    metrics: &RunMetrics,
) -> anyhow::Result<SavedArtifacts> {
    let reports_dir = base.join("reports");
    let logs_dir = base.join("logs");
    fs::create_dir_all(&reports_dir).context("Failed to create reports directory")?;
    fs::create_dir_all(&logs_dir).context("Failed to create logs directory")?;

    let slug = slugify_topic(topic);
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");

    let report_path = reports_dir.join(format!("{}_{}.{}", slug, timestamp, format_ext));
    fs::write(&report_path, report_text)
        .with_context(|| format!("Failed to write report to {}", report_path.display()))?;

    let log_path = logs_dir.join(format!("{}_{}_log.json", slug, timestamp));
    let json = serde_json::to_string_pretty(metrics).context("Failed to serialize usage log")?;
    fs::write(&log_path, json)
        .with_context(|| format!("Failed to write usage log to {}", log_path.display()))?;

    Ok(SavedArtifacts {
        report: report_path,
        log: log_path,
    })
}
