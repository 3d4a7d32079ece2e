//! 错误类型
//!
//! 三层：LlmError（补全后端）、ToolError（工具适配器）、AgentError（编排：路由失败、步骤失败、取消）。
//! 可恢复的格式问题（坏 JSON、未知意图名）不在此列，由路由/规划就地降级处理。

use thiserror::Error;

use crate::pipeline::{ExecutorContext, Intent};

/// 补全后端（OpenAI 兼容 / Mock）错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    RequestFailed(String),

    #[error("LLM API error: {0}")]
    ApiError(String),

    #[error("LLM client not configured: {0}")]
    NotConfigured(String),
}

/// 工具适配器错误；Display 文本原样写入 ToolRunOutput 的 error 字段
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("{0}")]
    Http(String),

    #[error("Request failed: {status} {body}")]
    Api { status: u16, body: String },

    #[error("{0}")]
    NotConfigured(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Llm(#[from] LlmError),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for ToolError {
    fn from(e: reqwest::Error) -> Self {
        ToolError::Http(e.to_string())
    }
}

/// 编排错误：一旦执行开始，除 Continue 策略外任何失败都向调用方抛出
#[derive(Error, Debug)]
pub enum AgentError {
    /// 分类后端不可达或拒绝请求；没有路由结果就无法继续
    #[error("Routing failed: {0}")]
    Routing(#[source] LlmError),

    /// 某一步失败（含 Unknown step / 超时）；context 为中止时刻的执行上下文
    #[error("{message}")]
    StepFailed {
        step: Intent,
        message: String,
        context: Box<ExecutorContext>,
    },

    /// 调用方取消；若执行已开始则附带当时的上下文
    #[error("Cancelled")]
    Cancelled {
        context: Option<Box<ExecutorContext>>,
    },
}

impl AgentError {
    /// 中止时的执行上下文（路由失败时为 None）
    pub fn context(&self) -> Option<&ExecutorContext> {
        match self {
            AgentError::StepFailed { context, .. } => Some(context),
            AgentError::Cancelled { context } => context.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_display_is_verbatim() {
        let e = ToolError::Other("quota exceeded".into());
        assert_eq!(e.to_string(), "quota exceeded");

        let e = ToolError::Api {
            status: 429,
            body: "slow down".into(),
        };
        assert_eq!(e.to_string(), "Request failed: 429 slow down");
    }

    #[test]
    fn test_routing_error_has_no_context() {
        let e = AgentError::Routing(LlmError::RequestFailed("dns".into()));
        assert!(e.context().is_none());
        assert!(e.to_string().contains("dns"));
    }
}
