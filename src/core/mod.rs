//! 核心层：错误分类（路由、工具、编排）

pub mod error;

pub use error::{AgentError, LlmError, ToolError};
