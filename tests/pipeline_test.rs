//! 回复管道集成测试：插件改写 → Bot 选择 → 会话 → 重试 → 归一化回复

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use wren::llm::{GenParams, MockProvider, ProviderError};
    use wren::roleplay::{Dispatch, RolePlayPlugin};
    use wren::session::{Role, SessionManager};
    use wren::{BotFactory, ChatBot, Context, ReplyKind};

    fn mock_bot(provider: Arc<MockProvider>) -> Arc<ChatBot> {
        Arc::new(
            ChatBot::new(
                "mock",
                provider,
                SessionManager::new("默认提示词", 4000),
                GenParams::new("mock-model", 0.3, 1.0),
                vec!["#清除记忆".to_string()],
                "#清除所有",
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_clear_memory_end_to_end() {
        let provider = Arc::new(MockProvider::echoing());
        let bot = mock_bot(provider);

        // 先积累历史
        let reply = bot.reply("你好", &Context::text("u1", "你好")).await;
        assert_eq!(reply.kind, ReplyKind::Text);
        assert_eq!(bot.sessions().active_count().await, 1);

        // 清除命令返回 INFO 且历史为空
        let reply = bot
            .reply("#清除记忆", &Context::text("u1", "#清除记忆"))
            .await;
        assert_eq!(reply.kind, ReplyKind::Info);
        assert_eq!(reply.content, "记忆已清除");
        assert_eq!(bot.sessions().active_count().await, 0);

        // 再清一次效果相同（幂等）
        let reply = bot
            .reply("#清除记忆", &Context::text("u1", "#清除记忆"))
            .await;
        assert_eq!(reply.content, "记忆已清除");
        assert_eq!(bot.sessions().active_count().await, 0);
    }

    #[tokio::test]
    async fn test_text_reply_records_turn() {
        let provider = Arc::new(MockProvider::echoing());
        let bot = mock_bot(provider);

        let reply = bot.reply("早上好", &Context::text("u1", "早上好")).await;
        assert_eq!(reply.kind, ReplyKind::Text);
        assert_eq!(reply.content, "Echo from Mock: 早上好");

        let session = bot.sessions().build_session("u1").await;
        let guard = session.lock().await;
        let msgs = guard.messages();
        assert_eq!(msgs[0].role, Role::System);
        assert_eq!(msgs[msgs.len() - 2].role, Role::User);
        assert_eq!(msgs[msgs.len() - 1].role, Role::Assistant);
        assert_eq!(guard.total_tokens(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_degraded_reply_consumes_no_tokens() {
        let provider = Arc::new(MockProvider::always(Err(ProviderError::TimedOut(
            "slow".into(),
        ))));
        let bot = mock_bot(provider.clone());

        let reply = bot.reply("在吗", &Context::text("u1", "在吗")).await;
        assert_eq!(reply.kind, ReplyKind::Error);
        assert_eq!(reply.content, "我没有收到你的消息");
        assert_eq!(provider.calls(), 3); // 初次 + 2 次重试

        // 失败不入史也不记账
        let session = bot.sessions().build_session("u1").await;
        let guard = session.lock().await;
        assert_eq!(guard.total_tokens(), 0);
        assert_eq!(guard.messages().last().unwrap().role, Role::User);
    }

    #[tokio::test]
    async fn test_persona_rewrite_then_reply() {
        // 角色目录落盘 → 插件加载 → 改写上下文 → 默认 Bot 回复
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grouproles.json");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(
            f,
            r#"{{"roles": [
                {{"group_name": "翻译群", "role_desc": "你是一名翻译官",
                  "wrapper": "Translate: %s"}}
            ]}}"#
        )
        .unwrap();

        let factory = BotFactory::new(wren::config::AppConfig::default());
        let plugin = RolePlayPlugin::load(&path, &factory).await.unwrap();

        let provider = Arc::new(MockProvider::echoing());
        let default_bot = mock_bot(provider);

        let mut ctx = Context::text("g1", "hello").with_group("翻译群");
        let dispatch = plugin.on_handle_context(&mut ctx, &default_bot).await;
        assert!(matches!(dispatch, Dispatch::Rewritten { bot: None }));
        assert_eq!(ctx.content, "Translate: hello");

        let query = ctx.content.clone();
        let reply = default_bot.reply(&query, &ctx).await;
        assert_eq!(reply.content, "Echo from Mock: Translate: hello");

        // 人设提示词已装入会话
        let session = default_bot.sessions().build_session("g1").await;
        let guard = session.lock().await;
        assert_eq!(guard.system_prompt(), "你是一名翻译官");
        assert_eq!(guard.messages()[0].content, "你是一名翻译官");
    }

    #[tokio::test]
    async fn test_unknown_group_passes_through() {
        let plugin = {
            // 空目录文件也能加载出空插件
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("grouproles.json");
            std::fs::write(&path, r#"{"roles": []}"#).unwrap();
            let factory = BotFactory::new(wren::config::AppConfig::default());
            RolePlayPlugin::load(&path, &factory).await.unwrap()
        };
        assert!(plugin.is_empty());

        let default_bot = mock_bot(Arc::new(MockProvider::echoing()));
        let mut ctx = Context::text("g1", "hello").with_group("路人群");
        let dispatch = plugin.on_handle_context(&mut ctx, &default_bot).await;
        assert!(matches!(dispatch, Dispatch::PassThrough));
        assert_eq!(ctx.content, "hello");
    }
}
