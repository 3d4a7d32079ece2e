//! LLM 客户端抽象
//!
//! 路由分类与 chat / reasoning / vision 工具都通过 LlmClient 发起一次非流式补全。

use async_trait::async_trait;

pub use crate::core::LlmError;
use crate::memory::Message;

/// 一次补全请求
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    /// None 表示沿用服务端默认值
    pub temperature: Option<f32>,
    /// 强制 JSON 输出（response_format = json_object）
    pub json_mode: bool,
    /// 附加到最后一条 user 消息的图片地址（URL 或 data URI）
    pub images: Vec<String>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }
}

/// LLM 客户端 trait：返回首个 choice 的文本内容
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 模型名（日志与 RouteResult.model 使用）
    fn model(&self) -> &str;

    /// 服务商标识，仅用于日志
    fn provider(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}
