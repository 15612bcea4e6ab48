//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Moonshot / ZhipuAI / Mock）实现 ChatProvider：
//! submit 执行一次补全调用，失败以 ProviderError 分类返回，从不抛过该边界。
//! 附件抽取走独立的 FileExtractor 接口（目前由 Moonshot 文件 API 提供）。

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::BotError;
use crate::session::Message;

/// 一次补全调用的结果：生成文本与提供方上报的用量
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub total_tokens: u64,
    pub completion_tokens: u64,
}

/// 生成参数。temperature / top_p 值域均为 [0, 1]
#[derive(Debug, Clone)]
pub struct GenParams {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
}

impl GenParams {
    pub fn new(model: impl Into<String>, temperature: f32, top_p: f32) -> Self {
        Self {
            model: model.into(),
            temperature,
            top_p,
        }
    }

    /// 构建 Bot 时校验；越界即配置错误，中止启动
    pub fn validate(&self) -> Result<(), BotError> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(BotError::InvalidParams(format!(
                "temperature {} out of range [0, 1]",
                self.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(BotError::InvalidParams(format!(
                "top_p {} out of range [0, 1]",
                self.top_p
            )));
        }
        Ok(())
    }
}

/// 远程调用失败的分类，在 SDK/HTTP 边界计算一次，驱动重试与用户提示策略
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("request timed out: {0}")]
    TimedOut(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("transient server error: {0}")]
    TransientServer(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// 重试前的退避时长；None 表示该分类不重试
    pub fn backoff(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited(_) => Some(Duration::from_secs(20)),
            ProviderError::TimedOut(_) => Some(Duration::from_secs(5)),
            ProviderError::TransientServer(_) => Some(Duration::from_secs(10)),
            ProviderError::ConnectionFailed(_)
            | ProviderError::Unsupported(_)
            | ProviderError::Other(_) => None,
        }
    }

    /// 替代模型回答展示给最终用户的文案；原始错误细节只进日志
    pub fn user_message(&self) -> &'static str {
        match self {
            ProviderError::RateLimited(_) => "提问太快啦，请休息一下再问我吧",
            ProviderError::TimedOut(_) => "我没有收到你的消息",
            ProviderError::ConnectionFailed(_) => "我连接不到你的网络",
            ProviderError::TransientServer(_) => "请再问我一次",
            ProviderError::Unsupported(_) | ProviderError::Other(_) => {
                "我现在有点累了，等会再来吧"
            }
        }
    }

    /// 只有无法归类的失败才视作上下文可能已损坏，终局时清除会话
    pub fn clears_session(&self) -> bool {
        matches!(self, ProviderError::Other(_))
    }

    /// 从 reqwest 传输层错误分类（超时 / 连接失败 / 其它）
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::TimedOut(err.to_string())
        } else if err.is_connect() {
            ProviderError::ConnectionFailed(err.to_string())
        } else {
            ProviderError::Other(err.to_string())
        }
    }

    /// 从 HTTP 状态码分类（裸端点：Moonshot 文件接口、ZhipuAI 画图）
    pub(crate) fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        use reqwest::StatusCode;
        match status {
            StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited(body),
            StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => ProviderError::TransientServer(body),
            _ => ProviderError::Other(body),
        }
    }
}

/// 聊天提供方：一次补全调用 + 可选的图像生成
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// 提供方标识，用于日志
    fn name(&self) -> &str;

    /// 执行一次补全调用
    async fn submit(
        &self,
        messages: &[Message],
        params: &GenParams,
    ) -> Result<Completion, ProviderError>;

    /// 图像生成，返回图片 URL；默认不支持
    async fn create_image(&self, _prompt: &str) -> Result<String, ProviderError> {
        Err(ProviderError::Unsupported("image generation".to_string()))
    }
}

/// 附件抽取：上传本地文件并取回抽取出的文本
#[async_trait]
pub trait FileExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_policy_table() {
        assert_eq!(
            ProviderError::RateLimited(String::new()).backoff(),
            Some(Duration::from_secs(20))
        );
        assert_eq!(
            ProviderError::TimedOut(String::new()).backoff(),
            Some(Duration::from_secs(5))
        );
        assert_eq!(
            ProviderError::TransientServer(String::new()).backoff(),
            Some(Duration::from_secs(10))
        );
        assert_eq!(ProviderError::ConnectionFailed(String::new()).backoff(), None);
        assert_eq!(ProviderError::Other(String::new()).backoff(), None);
    }

    #[test]
    fn test_user_messages_are_distinct_per_classification() {
        let msgs = [
            ProviderError::RateLimited(String::new()).user_message(),
            ProviderError::TimedOut(String::new()).user_message(),
            ProviderError::ConnectionFailed(String::new()).user_message(),
            ProviderError::TransientServer(String::new()).user_message(),
            ProviderError::Other(String::new()).user_message(),
        ];
        let unique: std::collections::HashSet<_> = msgs.iter().collect();
        assert_eq!(unique.len(), msgs.len());
    }

    #[test]
    fn test_only_unclassified_clears_session() {
        assert!(ProviderError::Other(String::new()).clears_session());
        assert!(!ProviderError::RateLimited(String::new()).clears_session());
        assert!(!ProviderError::TimedOut(String::new()).clears_session());
        assert!(!ProviderError::ConnectionFailed(String::new()).clears_session());
        assert!(!ProviderError::TransientServer(String::new()).clears_session());
    }

    #[test]
    fn test_gen_params_validation() {
        assert!(GenParams::new("m", 0.3, 1.0).validate().is_ok());
        assert!(GenParams::new("m", 1.5, 1.0).validate().is_err());
        assert!(GenParams::new("m", 0.3, -0.1).validate().is_err());
    }
}
