//! 对话历史
//!
//! 编排本身不保存跨请求状态；调用方用 ConversationMemory 记录最近 N 轮，
//! 每次请求把 history() 作为 chat / reasoning 的上下文传入。

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// 历史消息：仅 user / assistant
pub type HistoryMessage = Message;

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 最近 N 轮对话（每轮 user + assistant，实际保留约 max_turns*2 条）
#[derive(Clone, Debug)]
pub struct ConversationMemory {
    messages: Vec<Message>,
    max_turns: usize,
}

impl ConversationMemory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_turns,
        }
    }

    /// 记录一轮问答
    pub fn push_turn(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.messages.push(Message::user(user));
        self.messages.push(Message::assistant(assistant));
        self.prune();
    }

    /// 作为 history 传给编排的消息（过滤掉 system）
    pub fn history(&self) -> Vec<HistoryMessage> {
        self.messages
            .iter()
            .filter(|m| m.role != Role::System)
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    fn prune(&mut self) {
        let keep = self.max_turns * 2;
        if self.messages.len() > keep {
            self.messages.drain(..self.messages.len() - keep);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_keeps_latest_turns() {
        let mut mem = ConversationMemory::new(2);
        mem.push_turn("q1", "a1");
        mem.push_turn("q2", "a2");
        mem.push_turn("q3", "a3");
        let history = mem.history();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0], Message::user("q2"));
        assert_eq!(history[3], Message::assistant("a3"));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::assistant("x")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"x"}"#);
    }
}
