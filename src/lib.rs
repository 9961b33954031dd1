//! Scout - Rust 自主研究流水线
//!
//! 模块划分：
//! - **agent**: Agent 定义（角色 / 目标 / 背景 / 可用工具）与有界执行循环
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **crew**: Run Driver，为给定主题构建三个 Agent 与三阶段链并驱动编排器
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **observability**: tracing 日志初始化
//! - **pipeline**: 阶段数据模型、顺序编排器、用量聚合与失败状态
//! - **report**: 报告与用量日志落盘（reports/、logs/）
//! - **tools**: 工具箱（web_search、scrape、cite）与执行器

pub mod agent;
pub mod config;
pub mod crew;
pub mod llm;
pub mod observability;
pub mod pipeline;
pub mod report;
pub mod tools;
