//! Wren - 聊天机器人后端
//!
//! 入口：初始化日志、加载配置、装配默认 Bot 与角色插件，进入控制台回复循环。
//! 控制台只是开发用的替身渠道；真实渠道适配层通过 Context/Reply 接入。

use anyhow::Context as _;
use tokio::io::{AsyncBufReadExt, BufReader};
use wren::roleplay::{Dispatch, RolePlayPlugin};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    wren::observability::init();

    let cfg = wren::config::load_config(None).context("Failed to load config")?;
    let factory = wren::BotFactory::new(cfg.clone());
    let default_bot = factory
        .create_default_bot()
        .await
        .context("Failed to create bot")?;

    let roles_path = std::path::Path::new(&cfg.roleplay.roles_file);
    let plugin = if roles_path.exists() {
        Some(
            RolePlayPlugin::load(roles_path, &factory)
                .await
                .context("Failed to load role catalog")?,
        )
    } else {
        None
    };

    // 可选的命令行参数：把这个控制台会话当成某个群的成员，便于调试人设
    let group = std::env::args().nth(1);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        let mut ctx = wren::Context::text("console", line).with_admin(true);
        ctx.group_name = group.clone();

        let mut bot = default_bot.clone();
        if let Some(plugin) = &plugin {
            if let Dispatch::Rewritten {
                bot: Some(persona_bot),
            } = plugin.on_handle_context(&mut ctx, &default_bot).await
            {
                bot = persona_bot;
            }
        }

        let query = ctx.content.clone();
        let reply = bot.reply(&query, &ctx).await;
        println!("[{:?}] {}", reply.kind, reply.content);
    }

    Ok(())
}
