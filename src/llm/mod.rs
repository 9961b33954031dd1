//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

use crate::config::LlmSection;
use crate::pipeline::PipelineError;

pub use mock::MockLlmClient;
pub use openai::OpenAiClient;
pub use traits::{ChatCompletion, LlmClient, LlmError, Message, Role};

/// 本地 OpenAI 兼容服务的默认端点（vLLM 等）
pub const DEFAULT_API_BASE: &str = "http://localhost:8000/v1";

/// 根据配置创建 LLM 客户端
///
/// 端点优先级：config [llm].base_url > 环境变量 OPENAI_API_BASE > 本地默认值。
/// API Key 取 OPENAI_API_KEY，本地服务通常不校验，缺省为占位值。
pub fn create_llm_from_config(cfg: &LlmSection) -> Result<Arc<dyn LlmClient>, PipelineError> {
    let base_url = cfg
        .base_url
        .clone()
        .or_else(|| std::env::var("OPENAI_API_BASE").ok())
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(PipelineError::Setup(format!(
            "Invalid LLM base URL: {}",
            base_url
        )));
    }
    if cfg.model.trim().is_empty() {
        return Err(PipelineError::Setup("LLM model name is empty".to_string()));
    }

    Ok(Arc::new(OpenAiClient::new(
        Some(&base_url),
        &cfg.model,
        None,
    )))
}
