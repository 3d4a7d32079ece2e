//! ChatTool：快速、低成本的对话回复；不含路由或决策逻辑

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;

use crate::core::ToolError;
use crate::llm::{CompletionRequest, LlmClient};
use crate::memory::{HistoryMessage, Message, Role};
use crate::tools::{ChatTool, ToolResult};

/// 基于 LlmClient 的对话工具
pub struct LlmChatTool {
    llm: Arc<dyn LlmClient>,
}

impl LlmChatTool {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

/// system(context) + history(user/assistant) + user(input)
pub(crate) fn build_messages(
    system: Option<String>,
    history: &[HistoryMessage],
    input: String,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    if let Some(system) = system {
        messages.push(Message::system(system));
    }
    messages.extend(
        history
            .iter()
            .filter(|m| matches!(m.role, Role::User | Role::Assistant))
            .cloned(),
    );
    messages.push(Message::user(input));
    messages
}

#[async_trait]
impl ChatTool for LlmChatTool {
    async fn reply(
        &self,
        input: &str,
        history: &[HistoryMessage],
        context: Option<&str>,
    ) -> Result<ToolResult, ToolError> {
        let model = self.llm.model().to_string();
        let started = Instant::now();
        tracing::debug!(model = %model, provider = self.llm.provider(), "ChatTool.reply:start");

        let system = context.map(|c| format!("Context (web search results, if any):\n{c}"));
        let request = CompletionRequest::new(build_messages(system, history, input.to_string()));

        let text = self.llm.complete(request).await.map_err(|e| {
            tracing::error!(model = %model, error = %e, "ChatTool.reply:error");
            ToolError::from(e)
        })?;

        tracing::debug!(
            model = %model,
            duration_ms = started.elapsed().as_millis() as u64,
            "ChatTool.reply:success"
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
    use crate::llm::MockLlmClient;

    #[tokio::test]
    async fn test_reply_includes_history_and_context() {
        let llm = Arc::new(MockLlmClient::with_replies(vec![Ok("sunny".into())]));
        let tool = LlmChatTool::new(llm.clone());
        let history = vec![Message::user("hi"), Message::assistant("hello")];

        let result = tool
            .reply("weather?", &history, Some("Tokyo: 25C"))
            .await
            .unwrap();
        assert_eq!(result.text.as_deref(), Some("sunny"));

        let requests = llm.requests();
        let sent = &requests[0].messages;
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0].role, Role::System);
        assert!(sent[0].content.contains("Tokyo: 25C"));
        assert_eq!(sent[3], Message::user("weather?"));
    }

    #[test]
    fn test_build_messages_drops_system_history() {
        let history = vec![Message::system("old"), Message::user("q")];
        let messages = build_messages(None, &history, "now".into());
        assert_eq!(messages, vec![Message::user("q"), Message::user("now")]);
    }
}
