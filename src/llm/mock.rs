//! Mock LLM 客户端（用于测试与无 API Key 的本地运行）
//!
//! 有预置回复时按顺序返回；预置用尽后回显最后一条 User 消息。所有请求都会被记录，便于断言。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{CompletionRequest, LlmClient, LlmError};
use crate::memory::Role;

/// Mock 客户端
#[derive(Debug, Default)]
pub struct MockLlmClient {
    model: String,
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            model: "mock".to_string(),
            ..Default::default()
        }
    }

    /// 预置回复（含错误），按调用顺序消费
    pub fn with_replies(replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            model: "mock".to_string(),
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// 已收到的请求（按顺序）
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_else(|| "(no input)".to_string());

        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let scripted = self.replies.lock().ok().and_then(|mut r| r.pop_front());
        match scripted {
            Some(reply) => reply,
            None => Ok(format!("Echo from Mock: {last_user}")),
        }
    }
}
