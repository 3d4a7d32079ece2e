//! 记忆层：对话历史（由调用方跨轮次传入编排）

pub mod conversation;

pub use conversation::{ConversationMemory, HistoryMessage, Message, Role};
