//! 工具层：适配器契约、工具箱与 OpenAI 兼容实现

pub mod chat;
mod http;
pub mod image;
pub mod reasoning;
pub mod registry;
pub mod web_search;

pub use chat::LlmChatTool;
pub use image::OpenAiImageTool;
pub use reasoning::LlmReasoningTool;
pub use registry::{ChatTool, ImageTool, ReasoningTool, ToolResult, Toolbox, WebSearchTool};
pub use web_search::OpenAiWebSearchTool;
