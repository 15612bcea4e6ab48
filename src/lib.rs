//! Wren - Rust 聊天机器人后端
//!
//! 模块划分：
//! - **bot**: 回复管道（Reply / Context、ChatBot 的重试逻辑、Bot 工厂）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **error**: 初始化阶段的致命错误
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Moonshot / ZhipuAI / Mock）
//! - **observability**: 日志初始化
//! - **roleplay**: 群组角色扮演插件（按群名改写上下文后交回默认回复流程）
//! - **session**: 会话历史、裁剪与按键注册表

pub mod bot;
pub mod config;
pub mod error;
pub mod llm;
pub mod observability;
pub mod roleplay;
pub mod session;

pub use bot::{BotFactory, ChatBot, Context, ContextKind, Reply, ReplyKind};
pub use error::BotError;
