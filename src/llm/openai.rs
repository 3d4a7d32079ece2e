//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（base_url 来自模型配置）；
//! 支持温度、JSON 输出模式与 user 消息附带图片（视觉理解）。

use std::time::Instant;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContentPart,
    CreateChatCompletionRequestArgs, ImageUrlArgs, ResponseFormat,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::config::RuntimeAuth;
use crate::llm::{CompletionRequest, LlmClient, LlmError};
use crate::memory::{Message, Role};

/// OpenAI 兼容客户端：持有 Client、模型名与服务商标识
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    provider: String,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: &str) -> Self {
        let config = match base_url {
            Some(url) if !url.is_empty() => OpenAIConfig::new()
                .with_api_base(url)
                .with_api_key(api_key),
            _ => OpenAIConfig::new().with_api_key(api_key),
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            provider: "openai".to_string(),
        }
    }

    /// 由已解析的角色配置创建；缺少 API Key 或 base URL 时报错
    pub fn from_auth(auth: &RuntimeAuth) -> Result<Self, LlmError> {
        auth.ensure_complete().map_err(LlmError::NotConfigured)?;
        let mut client = Self::new(Some(&auth.base_url), &auth.model_name, &auth.api_key);
        client.provider = auth.provider.clone();
        Ok(client)
    }

    fn to_openai_messages(
        &self,
        messages: &[Message],
        images: &[String],
    ) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        let last_user = messages.iter().rposition(|m| m.role == Role::User);
        messages
            .iter()
            .enumerate()
            .map(|(index, m)| {
                let message = match m.role {
                    Role::System => ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::System),
                    Role::User if Some(index) == last_user && !images.is_empty() => {
                        return user_message_with_images(&m.content, images);
                    }
                    Role::User => ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::User),
                    Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::Assistant),
                };
                message.map_err(|e| LlmError::RequestFailed(e.to_string()))
            })
            .collect()
    }
}

fn user_message_with_images(
    text: &str,
    images: &[String],
) -> Result<ChatCompletionRequestMessage, LlmError> {
    let to_err = |e: async_openai::error::OpenAIError| LlmError::RequestFailed(e.to_string());

    let mut parts: Vec<ChatCompletionRequestUserMessageContentPart> =
        vec![ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(text)
            .build()
            .map_err(to_err)?
            .into()];
    for url in images {
        let image_url = ImageUrlArgs::default().url(url.as_str()).build().map_err(to_err)?;
        parts.push(
            ChatCompletionRequestMessageContentPartImageArgs::default()
                .image_url(image_url)
                .build()
                .map_err(to_err)?
                .into(),
        );
    }

    ChatCompletionRequestUserMessageArgs::default()
        .content(parts)
        .build()
        .map(ChatCompletionRequestMessage::User)
        .map_err(to_err)
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> &str {
        &self.provider
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(self.to_openai_messages(&request.messages, &request.images)?);
        if let Some(t) = request.temperature {
            args.temperature(t);
        }
        if request.json_mode {
            args.response_format(ResponseFormat::JsonObject);
        }
        let body = args
            .build()
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let started = Instant::now();
        let response = self
            .client
            .chat()
            .create(body)
            .await
            .map_err(|e| LlmError::ApiError(e.to_string()))?;

        let (prompt_tokens, completion_tokens) = response
            .usage
            .as_ref()
            .map_or((0, 0), |u| (u.prompt_tokens, u.completion_tokens));
        tracing::debug!(
            model = %self.model,
            prompt_tokens,
            completion_tokens,
            duration_ms = started.elapsed().as_millis() as u64,
            "chat/completions ok"
        );

        Ok(response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_images_attach_to_last_user_message_only() {
        let client = OpenAiClient::new(Some("http://localhost:1/v1"), "m", "sk-test");
        let messages = vec![
            Message::system("sys"),
            Message::user("first"),
            Message::assistant("ok"),
            Message::user("what is this?"),
        ];
        let out = client
            .to_openai_messages(&messages, &["https://example.com/a.png".to_string()])
            .unwrap();
        assert_eq!(out.len(), 4);
        assert!(matches!(out[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(out[2], ChatCompletionRequestMessage::Assistant(_)));
        assert!(matches!(out[3], ChatCompletionRequestMessage::User(_)));
    }
}
