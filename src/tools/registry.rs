//! 工具适配器契约与工具箱
//!
//! 四类能力（Chat / Reasoning / WebSearch / Image）各自一个 async trait，
//! Executor 通过 Toolbox 按意图分派；未装配的能力在执行时表现为 Unknown step。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::core::ToolError;
use crate::memory::HistoryMessage;
use crate::pipeline::{ImageInput, Intent};

/// 单次工具调用结果：文本 / 图片（纯 base64）/ 原始响应
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub raw: Value,
}

impl ToolResult {
    pub fn text(text: impl Into<String>, raw: Value) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
            raw,
        }
    }

    pub fn image(base64: impl Into<String>, raw: Value) -> Self {
        Self {
            text: None,
            image: Some(base64.into()),
            raw,
        }
    }
}

/// 普通对话；context 为同一计划中先前 webSearch 步骤的文本
#[async_trait]
pub trait ChatTool: Send + Sync {
    async fn reply(
        &self,
        input: &str,
        history: &[HistoryMessage],
        context: Option<&str>,
    ) -> Result<ToolResult, ToolError>;
}

/// 深度推理
#[async_trait]
pub trait ReasoningTool: Send + Sync {
    async fn think(
        &self,
        input: &str,
        history: &[HistoryMessage],
        context: Option<&str>,
    ) -> Result<ToolResult, ToolError>;
}

/// 联网搜索
#[async_trait]
pub trait WebSearchTool: Send + Sync {
    async fn search(&self, input: &str) -> Result<ToolResult, ToolError>;
}

/// 图片生成与理解
#[async_trait]
pub trait ImageTool: Send + Sync {
    /// 返回 ToolResult.image（base64）
    async fn generate(&self, prompt: &str, size: Option<&str>) -> Result<ToolResult, ToolError>;

    /// 返回 ToolResult.text
    async fn understand(&self, prompt: &str, images: &[ImageInput])
        -> Result<ToolResult, ToolError>;
}

/// 工具箱：每类能力至多一个适配器
#[derive(Clone, Default)]
pub struct Toolbox {
    pub chat: Option<Arc<dyn ChatTool>>,
    pub reasoning: Option<Arc<dyn ReasoningTool>>,
    pub web_search: Option<Arc<dyn WebSearchTool>>,
    pub image: Option<Arc<dyn ImageTool>>,
}

impl Toolbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chat(mut self, tool: Arc<dyn ChatTool>) -> Self {
        self.chat = Some(tool);
        self
    }

    pub fn with_reasoning(mut self, tool: Arc<dyn ReasoningTool>) -> Self {
        self.reasoning = Some(tool);
        self
    }

    pub fn with_web_search(mut self, tool: Arc<dyn WebSearchTool>) -> Self {
        self.web_search = Some(tool);
        self
    }

    pub fn with_image(mut self, tool: Arc<dyn ImageTool>) -> Self {
        self.image = Some(tool);
        self
    }

    /// 是否装配了处理该意图的适配器
    pub fn supports(&self, intent: Intent) -> bool {
        match intent {
            Intent::Chat => self.chat.is_some(),
            Intent::Reasoning => self.reasoning.is_some(),
            Intent::WebSearch => self.web_search.is_some(),
            Intent::ImageGenerate | Intent::ImageUnderstand => self.image.is_some(),
        }
    }

    /// 已装配的意图（按 Intent::ALL 顺序）
    pub fn intents(&self) -> Vec<Intent> {
        Intent::ALL
            .into_iter()
            .filter(|i| self.supports(*i))
            .collect()
    }
}

impl std::fmt::Debug for Toolbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolbox")
            .field("intents", &self.intents())
            .finish()
    }
}
