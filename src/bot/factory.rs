//! Bot 工厂：模型名到提供方的静态映射与 Bot 装配
//!
//! 映射表在配置加载期即可校验：未收录的模型名直接报配置错误，
//! 不做运行时的静默回落。

use std::sync::Arc;

use tracing::warn;

use crate::bot::ChatBot;
use crate::config::AppConfig;
use crate::error::BotError;
use crate::llm::{
    create_moonshot_provider, create_zhipu_provider, GenParams, MoonshotFiles, OpenAiChatProvider,
    GLM_3_TURBO, GLM_4, MOONSHOT_V1_128K, MOONSHOT_V1_32K, MOONSHOT_V1_8K,
};
use crate::session::SessionManager;

/// 提供方标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderTag {
    Moonshot,
    Zhipu,
    /// [compat] 配置的 OpenAI 兼容端点
    Compat,
}

impl ProviderTag {
    /// 角色目录里 bot_type 字段用的名字
    pub fn parse(s: &str) -> Result<Self, BotError> {
        match s {
            "moonshot" => Ok(ProviderTag::Moonshot),
            "zhipu" => Ok(ProviderTag::Zhipu),
            "compat" => Ok(ProviderTag::Compat),
            other => Err(BotError::UnknownProviderTag(other.to_string())),
        }
    }
}

/// 模型目录：精确名
const MODEL_CATALOG: &[(&str, ProviderTag)] = &[
    (MOONSHOT_V1_8K, ProviderTag::Moonshot),
    (MOONSHOT_V1_32K, ProviderTag::Moonshot),
    (MOONSHOT_V1_128K, ProviderTag::Moonshot),
    (GLM_4, ProviderTag::Zhipu),
    ("glm-4-plus", ProviderTag::Zhipu),
    (GLM_3_TURBO, ProviderTag::Zhipu),
    ("chatglm", ProviderTag::Zhipu),
];

/// 模型族前缀，精确名未命中时兜底
const MODEL_FAMILIES: &[(&str, ProviderTag)] = &[
    ("moonshot-", ProviderTag::Moonshot),
    ("glm-", ProviderTag::Zhipu),
];

/// 模型名 → 提供方标签。全局 use_compat_endpoint 优先于按名推断；
/// 目录之外的模型名是配置错误
pub fn resolve_bot_type(model: &str, config: &AppConfig) -> Result<ProviderTag, BotError> {
    if config.bot.use_compat_endpoint {
        return Ok(ProviderTag::Compat);
    }
    if let Some((_, tag)) = MODEL_CATALOG.iter().find(|(name, _)| *name == model) {
        return Ok(*tag);
    }
    if let Some((_, tag)) = MODEL_FAMILIES
        .iter()
        .find(|(prefix, _)| model.starts_with(prefix))
    {
        return Ok(*tag);
    }
    Err(BotError::UnsupportedModel(model.to_string()))
}

/// 按标签装配 ChatBot（带各自的会话注册表与默认参数）
pub struct BotFactory {
    config: AppConfig,
}

impl BotFactory {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 用 [bot].model 解析并装配默认 Bot
    pub async fn create_default_bot(&self) -> Result<Arc<ChatBot>, BotError> {
        let tag = resolve_bot_type(&self.config.bot.model, &self.config)?;
        self.create_bot(tag, Some(&self.config.bot.model)).await
    }

    /// 装配指定提供方的 Bot，可覆盖模型名
    pub async fn create_bot(
        &self,
        tag: ProviderTag,
        model_override: Option<&str>,
    ) -> Result<Arc<ChatBot>, BotError> {
        let cfg = &self.config;
        let bot = match tag {
            ProviderTag::Moonshot => {
                let provider = Arc::new(create_moonshot_provider(&cfg.moonshot));
                let files = MoonshotFiles::new(&cfg.moonshot);
                // 清理是尽力而为：失败只记日志，不拦着 Bot 启动
                if let Err(err) = files.clear_stale().await {
                    warn!("[moonshot] 清理陈旧文件失败: {}", err);
                }
                let model = model_override.unwrap_or(&cfg.moonshot.model);
                self.assemble("moonshot", provider, model)?
                    .with_extractor(Arc::new(files))
            }
            ProviderTag::Zhipu => {
                let provider = Arc::new(create_zhipu_provider(&cfg.zhipu));
                let model = model_override.unwrap_or(&cfg.zhipu.model);
                self.assemble("zhipu", provider, model)?
            }
            ProviderTag::Compat => {
                let provider = Arc::new(OpenAiChatProvider::new(
                    "compat",
                    cfg.compat.base_url.as_deref(),
                    cfg.compat.api_key.as_deref(),
                ));
                let model = model_override
                    .or(cfg.compat.model.as_deref())
                    .unwrap_or(&cfg.bot.model);
                self.assemble("compat", provider, model)?
            }
        };
        Ok(Arc::new(bot))
    }

    fn assemble(
        &self,
        name: &str,
        provider: Arc<dyn crate::llm::ChatProvider>,
        model: &str,
    ) -> Result<ChatBot, BotError> {
        let cfg = &self.config;
        ChatBot::new(
            name,
            provider,
            SessionManager::new(cfg.bot.system_prompt.as_str(), cfg.session.max_tokens),
            GenParams::new(model, cfg.bot.temperature, cfg.bot.top_p),
            cfg.bot.clear_memory_commands.clone(),
            cfg.bot.clear_all_command.clone(),
        )
    }
}
