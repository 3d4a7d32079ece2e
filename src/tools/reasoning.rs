//! ReasoningTool：带推理 system prompt 的补全，可消费先前搜索结果作为证据

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;

use crate::core::ToolError;
use crate::llm::{CompletionRequest, LlmClient};
use crate::memory::HistoryMessage;
use crate::prompts::REASONING_PROMPT;
use crate::tools::chat::build_messages;
use crate::tools::{ReasoningTool, ToolResult};

pub struct LlmReasoningTool {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl LlmReasoningTool {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            system_prompt: REASONING_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

#[async_trait]
impl ReasoningTool for LlmReasoningTool {
    async fn think(
        &self,
        input: &str,
        history: &[HistoryMessage],
        context: Option<&str>,
    ) -> Result<ToolResult, ToolError> {
        let model = self.llm.model().to_string();
        let started = Instant::now();
        tracing::debug!(model = %model, provider = self.llm.provider(), "ReasoningTool.think:start");

        let content = format!("user: {input}\ncontext: {}", context.unwrap_or("null"));
        let request = CompletionRequest::new(build_messages(
            Some(self.system_prompt.clone()),
            history,
            content,
        ));

        let text = self.llm.complete(request).await.map_err(|e| {
            tracing::error!(model = %model, error = %e, "ReasoningTool.think:error");
            ToolError::from(e)
        })?;

        tracing::debug!(
            model = %model,
            duration_ms = started.elapsed().as_millis() as u64,
            "ReasoningTool.think:success"
        );
        Ok(ToolResult::text(
            text.clone(),
            json!({ "model": model, "content": text }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LlmError;
    use crate::llm::MockLlmClient;
    use crate::memory::Role;

    #[tokio::test]
    async fn test_think_formats_user_and_context() {
        let llm = Arc::new(MockLlmClient::with_replies(vec![Ok("1. ... answer".into())]));
        let tool = LlmReasoningTool::new(llm.clone());

        tool.think("compare A and B", &[], None).await.unwrap();

        let requests = llm.requests();
        let sent = &requests[0].messages;
        assert_eq!(sent[0].role, Role::System);
        assert_eq!(sent[0].content, REASONING_PROMPT);
        assert_eq!(sent[1].content, "user: compare A and B\ncontext: null");
    }

    #[tokio::test]
    async fn test_llm_error_message_is_preserved() {
        let llm = Arc::new(MockLlmClient::with_replies(vec![Err(LlmError::ApiError(
            "rate limited".into(),
        ))]));
        let tool = LlmReasoningTool::new(llm);
        let err = tool.think("x", &[], None).await.unwrap_err();
        assert_eq!(err.to_string(), "LLM API error: rate limited");
    }
}
