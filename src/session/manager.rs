//! 会话注册表
//!
//! 按 session_id 管理会话。外层 RwLock 保护映射表本身；每个会话包在
//! Arc<Mutex<..>> 里，同一键的读-改-写由会话级互斥串行化，不同键互不影响。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::Session;

/// 会话管理器：查找/创建、追加、裁剪与清除
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
    /// 新会话的默认 system 提示词
    system_prompt: String,
    /// 裁剪预算（估算 token）
    max_tokens: usize,
}

impl SessionManager {
    pub fn new(system_prompt: impl Into<String>, max_tokens: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            system_prompt: system_prompt.into(),
            max_tokens: max_tokens.max(1),
        }
    }

    /// 查找或创建会话，不追加任何消息。
    /// 供调用方在决定用户文本之前检查/重置状态（如人设切换）。
    pub async fn build_session(&self, session_id: &str) -> Arc<Mutex<Session>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(session_id) {
                return session.clone();
            }
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(Session::new(
                    session_id,
                    self.system_prompt.as_str(),
                )))
            })
            .clone()
    }

    /// 追加用户消息并按预算裁剪，返回会话供提供方调用使用
    pub async fn session_query(&self, query: &str, session_id: &str) -> Arc<Mutex<Session>> {
        let session = self.build_session(session_id).await;
        {
            let mut guard = session.lock().await;
            guard.add_query(query);
            guard.discard_overflow(self.max_tokens);
        }
        session
    }

    /// 追加助手回复并记录最新用量
    pub async fn session_reply(&self, content: &str, session_id: &str, total_tokens: u64) {
        let session = self.build_session(session_id).await;
        let mut guard = session.lock().await;
        guard.add_reply(content, total_tokens);
    }

    /// 清除单个会话；会话不存在时静默成功
    pub async fn clear_session(&self, session_id: &str) {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
    }

    /// 清除所有会话
    pub async fn clear_all_session(&self) {
        let mut sessions = self.sessions.write().await;
        sessions.clear();
    }

    /// 当前活跃会话数
    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;

    #[tokio::test]
    async fn test_session_query_creates_and_appends() {
        let mgr = SessionManager::new("prompt", 4000);
        let session = mgr.session_query("你好", "u1").await;
        let guard = session.lock().await;
        assert_eq!(guard.session_id(), "u1");
        assert_eq!(guard.messages().len(), 2);
        assert_eq!(guard.messages()[0].role, Role::System);
        assert_eq!(guard.messages()[1].content, "你好");
    }

    #[tokio::test]
    async fn test_build_session_does_not_append() {
        let mgr = SessionManager::new("prompt", 4000);
        let session = mgr.build_session("u1").await;
        assert_eq!(session.lock().await.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_session_reply_updates_tokens() {
        let mgr = SessionManager::new("prompt", 4000);
        mgr.session_query("Q", "u1").await;
        mgr.session_reply("A", "u1", 77).await;
        let session = mgr.build_session("u1").await;
        let guard = session.lock().await;
        assert_eq!(guard.total_tokens(), 77);
        assert_eq!(guard.messages().last().unwrap().content, "A");
    }

    #[tokio::test]
    async fn test_clear_session_is_idempotent() {
        let mgr = SessionManager::new("prompt", 4000);
        mgr.session_query("Q", "u1").await;
        mgr.clear_session("u1").await;
        mgr.clear_session("u1").await; // 不存在也不报错
        assert_eq!(mgr.active_count().await, 0);
        // 清除后重新查询得到全新会话
        let session = mgr.session_query("再来", "u1").await;
        assert_eq!(session.lock().await.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_clear_all_session() {
        let mgr = SessionManager::new("prompt", 4000);
        mgr.session_query("Q", "u1").await;
        mgr.session_query("Q", "u2").await;
        assert_eq!(mgr.active_count().await, 2);
        mgr.clear_all_session().await;
        assert_eq!(mgr.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_sessions_are_independent_per_key() {
        let mgr = SessionManager::new("prompt", 4000);
        mgr.session_query("来自甲", "a").await;
        mgr.session_query("来自乙", "b").await;
        let a = mgr.build_session("a").await;
        assert_eq!(a.lock().await.messages()[1].content, "来自甲");
    }
}
