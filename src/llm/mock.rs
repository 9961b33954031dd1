//! Mock LLM 客户端（用于测试，无需 API）
//!
//! scripted 模式按顺序吐出预置回复并记固定 token 用量；unreachable 模式始终返回错误，
//! 用于模拟推理端点不可达。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::traits::{ChatCompletion, LlmClient, LlmError, Message};

/// Mock 客户端：预置回复队列 + 固定单次用量
pub struct MockLlmClient {
    script: Mutex<VecDeque<String>>,
    prompt_tokens: u64,
    completion_tokens: u64,
    unreachable: bool,
}

impl MockLlmClient {
    /// 按脚本顺序回复；默认每次请求记 10 prompt / 5 completion tokens
    pub fn scripted<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompt_tokens: 10,
            completion_tokens: 5,
            unreachable: false,
        }
    }

    /// 覆盖单次请求记账的 token 数
    pub fn with_usage(mut self, prompt_tokens: u64, completion_tokens: u64) -> Self {
        self.prompt_tokens = prompt_tokens;
        self.completion_tokens = completion_tokens;
        self
    }

    /// 始终返回请求错误（模拟端点不可达）
    pub fn unreachable() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            prompt_tokens: 0,
            completion_tokens: 0,
            unreachable: true,
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, _messages: &[Message]) -> Result<ChatCompletion, LlmError> {
        if self.unreachable {
            return Err(LlmError::Request(
                "connection refused (mock unreachable)".to_string(),
            ));
        }

        let text = self
            .script
            .lock()
            .expect("mock script lock")
            .pop_front()
            .unwrap_or_else(|| "(no scripted reply)".to_string());

        Ok(ChatCompletion {
            text,
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
        })
    }
}
