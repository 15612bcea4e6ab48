//! 会话：单个对话的有序历史与元数据
//!
//! 不变量：只要有历史，messages[0] 一定是携带当前 system_prompt 的 system 消息。
//! 提示词变更不追加第二条 system 消息，而是整体重置历史（reset_with_prompt）。

mod estimator;
mod manager;

pub use estimator::TokenEstimator;
pub use manager::SessionManager;

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

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
}

/// 单个会话：有序历史 + 元数据（提示词、附件加载标记、token 计数）
#[derive(Clone, Debug)]
pub struct Session {
    session_id: String,
    system_prompt: String,
    messages: Vec<Message>,
    /// 附件目录是否已转换为 system 消息（幂等保护，防止重复注入）
    files_loaded: bool,
    /// 最近一次提供方上报的累计用量
    total_tokens: u64,
}

impl Session {
    pub fn new(session_id: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        let system_prompt = system_prompt.into();
        Self {
            session_id: session_id.into(),
            messages: vec![Message::system(system_prompt.clone())],
            system_prompt,
            files_loaded: false,
            total_tokens: 0,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn files_loaded(&self) -> bool {
        self.files_loaded
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    /// 追加一条用户消息
    pub fn add_query(&mut self, query: impl Into<String>) {
        self.messages.push(Message::user(query));
    }

    /// 追加一条助手回复并记录最新用量
    pub fn add_reply(&mut self, content: impl Into<String>, total_tokens: u64) {
        self.messages.push(Message::assistant(content));
        self.total_tokens = total_tokens;
    }

    /// 把附件抽取出的文本作为 system 消息追加到历史末尾
    pub fn push_system_context(&mut self, content: impl Into<String>) {
        self.messages.push(Message::system(content));
    }

    pub fn mark_files_loaded(&mut self) {
        self.files_loaded = true;
    }

    /// 换提示词并整体重置：历史只剩新的 system 消息，
    /// 附件标记与 token 计数一并归零（新人设需要重新注入附件）
    pub fn reset_with_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = prompt.into();
        self.messages.clear();
        self.messages.push(Message::system(self.system_prompt.clone()));
        self.files_loaded = false;
        self.total_tokens = 0;
    }

    /// 估算 token 超出预算时裁剪历史：优先成对丢弃最早的 user/assistant
    /// 轮次，system 消息永不丢弃，最新一条消息永远保留
    pub fn discard_overflow(&mut self, max_tokens: usize) {
        while self.estimated_tokens() > max_tokens {
            let idx = match self.messages.iter().position(|m| m.role != Role::System) {
                Some(i) => i,
                None => break,
            };
            if idx + 1 >= self.messages.len() {
                break;
            }
            if self.messages[idx].role == Role::User
                && self.messages[idx + 1].role == Role::Assistant
            {
                self.messages.drain(idx..=idx + 1);
            } else {
                self.messages.remove(idx);
            }
        }
    }

    /// 整个历史的估算 token 数
    pub fn estimated_tokens(&self) -> usize {
        self.messages
            .iter()
            .map(|m| TokenEstimator::estimate(&m.content))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_has_leading_system_message() {
        let s = Session::new("s1", "你是助手");
        assert_eq!(s.messages().len(), 1);
        assert_eq!(s.messages()[0].role, Role::System);
        assert_eq!(s.messages()[0].content, "你是助手");
    }

    #[test]
    fn test_query_reply_round_trip() {
        let mut s = Session::new("s1", "prompt");
        s.add_query("Q");
        s.add_reply("A", 42);
        let tail: Vec<_> = s.messages().iter().rev().take(2).collect();
        assert_eq!(tail[1].role, Role::User);
        assert_eq!(tail[1].content, "Q");
        assert_eq!(tail[0].role, Role::Assistant);
        assert_eq!(tail[0].content, "A");
        assert_eq!(s.total_tokens(), 42);
    }

    #[test]
    fn test_reset_with_prompt_discards_history() {
        let mut s = Session::new("s1", "old");
        s.add_query("Q");
        s.add_reply("A", 10);
        s.push_system_context("file content");
        s.mark_files_loaded();

        s.reset_with_prompt("new");
        assert_eq!(s.messages().len(), 1);
        assert_eq!(s.messages()[0].content, "new");
        assert_eq!(s.system_prompt(), "new");
        assert!(!s.files_loaded());
        assert_eq!(s.total_tokens(), 0);
    }

    #[test]
    fn test_discard_overflow_drops_oldest_pairs_first() {
        let mut s = Session::new("s1", "p");
        for i in 0..6 {
            s.add_query(format!("question number {} {}", i, "x".repeat(200)));
            s.add_reply(format!("answer number {} {}", i, "y".repeat(200)), 1);
        }
        let before = s.messages().len();
        s.discard_overflow(150);
        assert!(s.messages().len() < before);
        // system 消息保留在头部
        assert_eq!(s.messages()[0].role, Role::System);
        // 剩下的轮次是最新的
        let last = s.messages().last().unwrap();
        assert!(last.content.starts_with("answer number 5"));
    }

    #[test]
    fn test_discard_overflow_keeps_latest_message() {
        let mut s = Session::new("s1", "p");
        s.add_query("z".repeat(4000));
        s.discard_overflow(10);
        // 刚追加的提问即便超预算也不能被裁掉
        assert_eq!(s.messages().len(), 2);
        assert_eq!(s.messages()[1].role, Role::User);
    }

    #[test]
    fn test_discard_overflow_never_drops_system_messages() {
        let mut s = Session::new("s1", "p");
        s.push_system_context("attached file text ".repeat(30));
        s.add_query("hello");
        s.add_reply("world", 1);
        s.add_query("again");
        s.discard_overflow(1);
        assert!(s.messages().iter().filter(|m| m.role == Role::System).count() >= 2);
    }
}
