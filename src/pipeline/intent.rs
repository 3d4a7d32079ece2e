//! 意图：一次请求可能需要的能力（封闭集合）

use std::fmt;

use serde::{Deserialize, Serialize};

/// 能力标识；序列化名与路由模型输出的 JSON 一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intent {
    #[serde(rename = "chat")]
    Chat,
    #[serde(rename = "webSearch")]
    WebSearch,
    #[serde(rename = "reasoning")]
    Reasoning,
    #[serde(rename = "image_generate")]
    ImageGenerate,
    #[serde(rename = "image_understand")]
    ImageUnderstand,
}

impl Intent {
    pub const ALL: [Intent; 5] = [
        Intent::Chat,
        Intent::WebSearch,
        Intent::Reasoning,
        Intent::ImageGenerate,
        Intent::ImageUnderstand,
    ];

    /// 规范名
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Chat => "chat",
            Intent::WebSearch => "webSearch",
            Intent::Reasoning => "reasoning",
            Intent::ImageGenerate => "image_generate",
            Intent::ImageUnderstand => "image_understand",
        }
    }

    /// 解析意图名（去首尾空白）；`web_search` 视为 `webSearch` 的别名，其余未知值返回 None
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "chat" => Some(Intent::Chat),
            "webSearch" | "web_search" => Some(Intent::WebSearch),
            "reasoning" => Some(Intent::Reasoning),
            "image_generate" => Some(Intent::ImageGenerate),
            "image_understand" => Some(Intent::ImageUnderstand),
            _ => None,
        }
    }

    /// 该步骤的文本输出是否可作为最终答案
    pub fn yields_answer(&self) -> bool {
        matches!(
            self,
            Intent::Chat | Intent::Reasoning | Intent::WebSearch | Intent::ImageUnderstand
        )
    }
}

impl AsRef<str> for Intent {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
