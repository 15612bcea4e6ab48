//! 群组角色扮演插件
//!
//! 启动时从 JSON 角色目录加载各群人设；收到文本消息时按群名查人设，
//! 改写上下文（提示词包装、bot 覆盖、工具与附件目录）后交回默认回复流程。
//! 任何一条人设引用了不支持的模型都会使整个插件初始化失败，不做降级加载。

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::bot::{resolve_bot_type, BotFactory, ChatBot, Context, ContextKind, ProviderTag};
use crate::error::BotError;

/// 角色目录（grouproles.json）中的一条配置
#[derive(Debug, Clone, Deserialize)]
pub struct RoleEntry {
    pub group_name: String,
    pub role_desc: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub bot_type: Option<String>,
    #[serde(default)]
    pub wrapper: Option<String>,
    #[serde(default)]
    pub tools: Option<Vec<Value>>,
    #[serde(default)]
    pub file_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RoleCatalog {
    roles: Vec<RoleEntry>,
}

/// 解析后的群组人设：提示词 + 可选的专属 Bot / 包装模板 / 工具 / 附件目录
pub struct GroupRolePlay {
    pub group_name: String,
    pub role_desc: String,
    pub wrapper: Option<String>,
    pub tools: Option<Vec<Value>>,
    pub file_dir: Option<String>,
    /// 人设专属 Bot；None 时用默认 Bot
    pub bot: Option<Arc<ChatBot>>,
}

impl GroupRolePlay {
    /// 解析一条配置。bot_type 显式指定提供方；只给 model 时按目录推断。
    /// 模型/标签不认识立即报错，整个目录加载随之中止。
    pub async fn from_entry(entry: RoleEntry, factory: &BotFactory) -> Result<Self, BotError> {
        let bot = match (&entry.bot_type, &entry.model) {
            (Some(bot_type), _) => {
                let tag = ProviderTag::parse(bot_type)?;
                Some(factory.create_bot(tag, entry.model.as_deref()).await?)
            }
            (None, Some(model)) => {
                let tag = resolve_bot_type(model, factory.config())?;
                Some(factory.create_bot(tag, Some(model)).await?)
            }
            (None, None) => None,
        };

        Ok(Self {
            group_name: entry.group_name,
            role_desc: entry.role_desc,
            wrapper: entry.wrapper,
            tools: entry.tools,
            file_dir: entry.file_dir,
            bot,
        })
    }

    /// 手动重置该群在某个 Bot 下的会话
    pub async fn reset(&self, bot: &ChatBot, session_id: &str) {
        bot.sessions().clear_session(session_id).await;
    }

    /// 产出本轮最终提示词。没有会话过期事件可依赖，这里用提示词等值
    /// 判断人设切换：不一致就整体重置会话再继续
    pub async fn action(&self, bot: &ChatBot, session_id: &str, user_action: &str) -> String {
        let session = bot.sessions().build_session(session_id).await;
        {
            let mut guard = session.lock().await;
            if guard.system_prompt() != self.role_desc {
                guard.reset_with_prompt(&self.role_desc);
            }
        }
        match &self.wrapper {
            Some(wrapper) => wrapper.replacen("%s", user_action, 1),
            None => user_action.to_string(),
        }
    }
}

/// 插件分发结果
pub enum Dispatch {
    /// 没有该群的人设配置，上下文保持原样
    PassThrough,
    /// 上下文已改写，继续走默认回复流程；bot 为人设专属覆盖（如有）
    Rewritten { bot: Option<Arc<ChatBot>> },
}

/// 群组角色扮演插件：group_name → GroupRolePlay
pub struct RolePlayPlugin {
    roles: HashMap<String, GroupRolePlay>,
}

// GroupRolePlay 持有 Arc<ChatBot>（内含 dyn ChatProvider，非 Debug），无法派生 Debug；
// 这里手写一个仅展示群名的实现，满足测试里 Result::unwrap_err 的 Debug 约束
impl std::fmt::Debug for RolePlayPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RolePlayPlugin")
            .field("groups", &self.roles.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RolePlayPlugin {
    /// 加载角色目录。文件缺失、JSON 不合法或任一人设解析失败都会返回错误
    pub async fn load(path: &Path, factory: &BotFactory) -> Result<Self, BotError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| BotError::RoleCatalog(format!("{}: {}", path.display(), e)))?;
        let catalog: RoleCatalog = serde_json::from_str(&raw)
            .map_err(|e| BotError::RoleCatalog(format!("{}: {}", path.display(), e)))?;

        let mut roles = HashMap::new();
        for entry in catalog.roles {
            let role = GroupRolePlay::from_entry(entry, factory).await?;
            roles.insert(role.group_name.clone(), role);
        }
        info!("[RolePlay] 角色目录加载完成，共 {} 个群", roles.len());
        Ok(Self { roles })
    }

    pub fn get(&self, group_name: &str) -> Option<&GroupRolePlay> {
        self.roles.get(group_name)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// 按群名改写上下文。只处理文本消息；未配置人设的群原样放行
    pub async fn on_handle_context(
        &self,
        ctx: &mut Context,
        default_bot: &Arc<ChatBot>,
    ) -> Dispatch {
        if ctx.kind != ContextKind::Text {
            return Dispatch::PassThrough;
        }
        let Some(group_name) = ctx.group_name.clone() else {
            return Dispatch::PassThrough;
        };
        let Some(role) = self.roles.get(&group_name) else {
            return Dispatch::PassThrough;
        };
        info!("[RolePlay] 命中群组人设: {}", group_name);

        let bot = role.bot.as_ref().unwrap_or(default_bot);
        let session_id = ctx.session_id.clone();
        let content = ctx.content.clone();
        ctx.content = role.action(bot, &session_id, &content).await;

        if let Some(tools) = &role.tools {
            ctx.set("tools", json!(tools));
        }
        if let Some(dir) = &role.file_dir {
            ctx.set("file_dir", json!(dir));
        }

        Dispatch::Rewritten {
            bot: role.bot.clone(),
        }
    }
}
