//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `WREN__*` 覆盖（双下划线表示嵌套，
//! 如 `WREN__BOT__MODEL=glm-4`）。API Key 也可走各提供方惯用的环境变量
//! （MOONSHOT_API_KEY / ZHIPU_API_KEY），见 llm 模块的构造函数。

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub bot: BotSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub moonshot: MoonshotSection,
    #[serde(default)]
    pub zhipu: ZhipuSection,
    #[serde(default)]
    pub compat: CompatSection,
    #[serde(default)]
    pub roleplay: RolePlaySection,
}

/// [bot] 段：默认模型、生成参数与会话命令
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotSection {
    /// 默认模型名，经 factory::resolve_bot_type 映射到提供方
    pub model: String,
    /// 值域 [0, 1]
    pub temperature: f32,
    /// 值域 [0, 1]
    pub top_p: f32,
    /// 每个新会话开头的 system 提示词
    pub system_prompt: String,
    /// 命中即清除当前会话，不发起模型调用
    pub clear_memory_commands: Vec<String>,
    /// 命中即清除所有会话
    pub clear_all_command: String,
    /// 为 true 时所有模型一律走 [compat] 配置的 OpenAI 兼容端点，
    /// 优先级高于按模型名的推断
    pub use_compat_endpoint: bool,
}

impl Default for BotSection {
    fn default() -> Self {
        Self {
            model: "moonshot-v1-128k".to_string(),
            temperature: 0.3,
            top_p: 1.0,
            system_prompt: "你是一个乐于助人的聊天助手，用简洁的中文回答问题。".to_string(),
            clear_memory_commands: vec!["#清除记忆".to_string()],
            clear_all_command: "#清除所有".to_string(),
            use_compat_endpoint: false,
        }
    }
}

/// [session] 段：历史裁剪预算
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// 估算 token 超过该值时，从最旧的 user/assistant 轮次开始丢弃
    pub max_tokens: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self { max_tokens: 4000 }
    }
}

/// [moonshot] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MoonshotSection {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl Default for MoonshotSection {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: crate::llm::MOONSHOT_BASE_URL.to_string(),
            model: "moonshot-v1-128k".to_string(),
        }
    }
}

/// [zhipu] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ZhipuSection {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl Default for ZhipuSection {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: crate::llm::ZHIPU_BASE_URL.to_string(),
            model: "glm-4".to_string(),
        }
    }
}

/// [compat] 段：use_compat_endpoint 开启时生效的 OpenAI 兼容端点
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CompatSection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// 不设置时沿用 [bot].model
    pub model: Option<String>,
}

/// [roleplay] 段：角色目录文件位置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RolePlaySection {
    pub roles_file: String,
}

impl Default for RolePlaySection {
    fn default() -> Self {
        Self {
            roles_file: "grouproles.json".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bot: BotSection::default(),
            session: SessionSection::default(),
            moonshot: MoonshotSection::default(),
            zhipu: ZhipuSection::default(),
            compat: CompatSection::default(),
            roleplay: RolePlaySection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 WREN__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 WREN__*（双下划线表示嵌套键）
pub fn load_config(
    config_path: Option<std::path::PathBuf>,
) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("WREN")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.bot.model, "moonshot-v1-128k");
        assert_eq!(cfg.bot.clear_memory_commands, vec!["#清除记忆"]);
        assert_eq!(cfg.bot.clear_all_command, "#清除所有");
        assert!(!cfg.bot.use_compat_endpoint);
        assert_eq!(cfg.session.max_tokens, 4000);
        assert_eq!(cfg.zhipu.model, "glm-4");
    }

    #[test]
    fn test_temperature_in_range() {
        let cfg = AppConfig::default();
        assert!((0.0..=1.0).contains(&cfg.bot.temperature));
        assert!((0.0..=1.0).contains(&cfg.bot.top_p));
    }
}
