//! Agent Playground - 客户端 AI 对话编排核心
//!
//! 模块划分：
//! - **agent**: 门面（AgentRequest → AgentOutput）
//! - **config**: 应用配置加载（TOML + 环境变量）与按角色解析模型
//! - **core**: 错误类型
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 对话历史
//! - **observability**: 日志初始化
//! - **pipeline**: 意图路由、计划规范化、顺序执行、答案合成
//! - **prompts**: 内置 Prompt
//! - **tools**: 工具适配器（chat / reasoning / webSearch / image）

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod pipeline;
pub mod prompts;
pub mod tools;

pub use agent::{Agent, AgentOutput, AgentRequest};
pub use core::AgentError;
pub use pipeline::{Intent, ProgressEvent};
