//! Mock 客户端（用于测试，无需 API）
//!
//! 按脚本吐出预设结果，脚本耗尽后回显最后一条 User 消息；
//! 调用计数用于验证重试次数。

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::llm::{ChatProvider, Completion, FileExtractor, GenParams, ProviderError};
use crate::session::{Message, Role};

/// Mock 客户端：脚本化结果队列 + 固定结果 + 回显兜底
pub struct MockProvider {
    script: Mutex<VecDeque<Result<Completion, ProviderError>>>,
    /// 脚本耗尽后的固定结果；None 时回显最后一条用户消息
    default: Option<Result<Completion, ProviderError>>,
    calls: AtomicU32,
}

impl MockProvider {
    /// 回显最后一条用户消息
    pub fn echoing() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default: None,
            calls: AtomicU32::new(0),
        }
    }

    /// 先按脚本顺序吐出结果，耗尽后回显
    pub fn scripted(outcomes: Vec<Result<Completion, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            default: None,
            calls: AtomicU32::new(0),
        }
    }

    /// 每次调用都返回同一个结果
    pub fn always(outcome: Result<Completion, ProviderError>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default: Some(outcome),
            calls: AtomicU32::new(0),
        }
    }

    /// 已发起的 submit 次数
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

/// 测试用的成功补全
pub fn completion(content: &str, total_tokens: u64, completion_tokens: u64) -> Completion {
    Completion {
        content: content.to_string(),
        total_tokens,
        completion_tokens,
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn submit(
        &self,
        messages: &[Message],
        _params: &GenParams,
    ) -> Result<Completion, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(next) = self.script.lock().await.pop_front() {
            return next;
        }
        if let Some(default) = &self.default {
            return default.clone();
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        Ok(Completion {
            content: format!("Echo from Mock: {}", last_user),
            total_tokens: 10,
            completion_tokens: 5,
        })
    }
}

/// Mock 抽取器：直接读文件内容当抽取结果
#[derive(Default)]
pub struct MockExtractor {
    calls: AtomicU32,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileExtractor for MockExtractor {
    async fn extract(&self, path: &Path) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ProviderError::Other(e.to_string()))
    }
}
