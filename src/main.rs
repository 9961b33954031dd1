//! Scout - Rust 自主研究流水线
//!
//! 入口：初始化日志、解析参数、构建 LLM 与研究团队、执行流水线并落盘。
//! 编排失败时打印单行原因与已聚合的部分用量，非零退出，不写半成品报告。

use std::path::Path;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;

use scout::config::{load_config, AppConfig};
use scout::crew::ResearchCrew;
use scout::llm::create_llm_from_config;
use scout::{observability, report};

/// 报告输出格式（内容一律为 Markdown 文本，仅决定扩展名）
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReportFormat {
    Md,
    Pdf,
    Html,
}

impl ReportFormat {
    fn extension(self) -> &'static str {
        match self {
            ReportFormat::Md => "md",
            ReportFormat::Pdf => "pdf",
            ReportFormat::Html => "html",
        }
    }
}

/// 本地自主研究流水线：检索、摘要、成稿
#[derive(Debug, Parser)]
#[command(name = "scout", version, about = "Local autonomous research pipeline")]
struct Cli {
    /// 研究主题
    topic: String,

    /// 输出格式
    #[arg(long, value_enum, default_value = "md")]
    format: ReportFormat,

    /// 可选时间窗口（如 "2022-2024"）
    #[arg(long)]
    time_window: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();
    let cli = Cli::parse();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "config load failed, using defaults");
        AppConfig::default()
    });

    println!("Starting research on topic: '{}'", cli.topic);

    let llm = create_llm_from_config(&cfg.llm).context("Failed to set up the LLM client")?;
    let crew = ResearchCrew::new(llm, &cfg);

    // Ctrl-C 触发取消：传播到当前阶段，已提交的结果不受影响
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling run");
                cancel.cancel();
            }
        });
    }

    match crew.run(&cli.topic, cli.time_window.as_deref(), &cancel).await {
        Ok(outcome) => {
            println!("\nResearch complete!");
            println!(
                "LLM usage: prompt={} completion={} total={}",
                outcome.usage.prompt_tokens,
                outcome.usage.completion_tokens,
                outcome.usage.total()
            );

            let saved = report::save_outputs(
                Path::new("."),
                &cli.topic,
                cli.format.extension(),
                &outcome.final_text,
                &outcome.metrics,
            )
            .context("Failed to persist outputs")?;

            println!("Report saved to: {}", saved.report.display());
            println!("Logs saved to: {}", saved.log.display());
            Ok(())
        }
        Err(e) => {
            let usage = e.partial_usage();
            eprintln!("Research failed: {}", e);
            if usage.total() > 0 {
                eprintln!(
                    "Partial usage before failure: prompt={} completion={}",
                    usage.prompt_tokens, usage.completion_tokens
                );
            }
            std::process::exit(1);
        }
    }
}
