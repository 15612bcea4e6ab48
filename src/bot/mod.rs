//! 回复管道的公共类型：Reply 与 Context
//!
//! Context 是渠道适配层交进来的单条消息上下文；除固定字段外，
//! 插件/适配层可以通过 extras 附带按次覆盖（模型名、附件目录、工具列表等）。

mod chat;
mod factory;

pub use chat::{ChatBot, TextOutcome, MAX_RETRIES};
pub use factory::{resolve_bot_type, BotFactory, ProviderTag};

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// 回复类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// 模型生成的正文
    Text,
    /// 用户可见的失败文案
    Error,
    /// 命令确认等提示信息
    Info,
    /// 图像生成结果
    ImageUrl,
}

/// 归一化后的回复：每次 reply 调用恰好产出一条
#[derive(Debug, Clone)]
pub struct Reply {
    pub kind: ReplyKind,
    pub content: String,
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::Text,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::Error,
            content: content.into(),
        }
    }

    pub fn info(content: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::Info,
            content: content.into(),
        }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::ImageUrl,
            content: url.into(),
        }
    }
}

/// 消息类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Text,
    ImageCreate,
    Image,
    Voice,
}

/// 单条入站消息的上下文
#[derive(Debug, Clone)]
pub struct Context {
    pub kind: ContextKind,
    pub session_id: String,
    /// 原始（或被插件改写后的）用户文本
    pub content: String,
    /// 消息来源群的标识，私聊为 None
    pub group_name: Option<String>,
    /// 特权操作（如图像生成）的管理员标记
    pub is_admin: bool,
    extras: HashMap<String, Value>,
}

impl Context {
    pub fn text(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: ContextKind::Text,
            session_id: session_id.into(),
            content: content.into(),
            group_name: None,
            is_admin: false,
            extras: HashMap::new(),
        }
    }

    pub fn image_create(session_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            kind: ContextKind::ImageCreate,
            ..Self::text(session_id, prompt)
        }
    }

    pub fn with_group(mut self, group_name: impl Into<String>) -> Self {
        self.group_name = Some(group_name.into());
        self
    }

    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }

    /// 读取按次覆盖项
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.extras
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// 写入按次覆盖项（插件改写上下文时使用）
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.extras.insert(key.into(), value);
    }
}
