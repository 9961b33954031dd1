//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：complete 接收消息列表，
//! 返回 ChatCompletion（文本 + 本次请求的 token 用量），供编排器逐阶段归集成本。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 单次完成结果：文本与本次请求消耗的 token 数
#[derive(Clone, Debug, Default)]
pub struct ChatCompletion {
    pub text: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// LLM 请求错误（网络 / 端点 / 协议）
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Request(String),
}

/// LLM 客户端 trait：提交消息列表，取回结构化完成与用量计数
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<ChatCompletion, LlmError>;
}
