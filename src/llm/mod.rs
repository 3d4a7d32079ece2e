//! LLM 层：补全客户端抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::MockLlmClient;
pub use openai::OpenAiClient;
pub use traits::{CompletionRequest, LlmClient, LlmError};
