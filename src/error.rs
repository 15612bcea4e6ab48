//! 初始化阶段的致命错误
//!
//! 远程调用失败不在此列（见 llm::ProviderError，永远不会越过 reply_text 边界）；
//! 这里只收敛启动/加载期必须中止的配置类错误。

use thiserror::Error;

/// Bot 构建与插件加载期的错误，出现即中止对应组件的启动
#[derive(Error, Debug)]
pub enum BotError {
    #[error("model is not supported: {0}")]
    UnsupportedModel(String),

    #[error("unknown provider tag: {0}")]
    UnknownProviderTag(String),

    #[error("invalid generation params: {0}")]
    InvalidParams(String),

    #[error("role catalog error: {0}")]
    RoleCatalog(String),

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
}
