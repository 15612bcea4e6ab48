//! ChatBot：会话命令、带重试的补全调用与回复归一化
//!
//! 提供方差异全部收在 ChatProvider 接口后面；这里只负责管道本身：
//! 命令旁路 → 会话追加/裁剪 → 按次参数解析与附件注入 → reply_text 重试 →
//! 成功入史 / 失败降级为用户可见文案。

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::bot::{Context, ContextKind, Reply};
use crate::error::BotError;
use crate::llm::{ChatProvider, Completion, FileExtractor, GenParams, ProviderError};
use crate::session::{Message, Session, SessionManager};

/// 首次调用之外最多再试的次数
pub const MAX_RETRIES: u32 = 2;

/// reply_text 的归一化结果：要么完成，要么带着分类降级
#[derive(Debug)]
pub enum TextOutcome {
    Completed(Completion),
    Failed { kind: ProviderError },
}

impl TextOutcome {
    /// 失败时为 0（未消耗生成 token）
    pub fn completion_tokens(&self) -> u64 {
        match self {
            TextOutcome::Completed(c) => c.completion_tokens,
            TextOutcome::Failed { .. } => 0,
        }
    }
}

/// 一个已装配好的 Bot：提供方 + 自己的会话注册表 + 默认生成参数
pub struct ChatBot {
    name: String,
    provider: Arc<dyn ChatProvider>,
    extractor: Option<Arc<dyn FileExtractor>>,
    sessions: SessionManager,
    params: GenParams,
    clear_memory_commands: Vec<String>,
    clear_all_command: String,
}

impl ChatBot {
    pub fn new(
        name: impl Into<String>,
        provider: Arc<dyn ChatProvider>,
        sessions: SessionManager,
        params: GenParams,
        clear_memory_commands: Vec<String>,
        clear_all_command: impl Into<String>,
    ) -> Result<Self, BotError> {
        params.validate()?;
        Ok(Self {
            name: name.into(),
            provider,
            extractor: None,
            sessions,
            params,
            clear_memory_commands,
            clear_all_command: clear_all_command.into(),
        })
    }

    /// 挂上附件抽取器（目前只有 Moonshot 提供）
    pub fn with_extractor(mut self, extractor: Arc<dyn FileExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn params(&self) -> &GenParams {
        &self.params
    }

    /// 处理一条入站消息，恰好产出一条归一化回复
    pub async fn reply(&self, query: &str, ctx: &Context) -> Reply {
        match ctx.kind {
            ContextKind::Text => self.reply_to_text(query, ctx).await,
            ContextKind::ImageCreate => self.reply_to_image_create(query, ctx).await,
            other => Reply::error(format!("Bot不支持处理{:?}类型的消息", other)),
        }
    }

    async fn reply_to_text(&self, query: &str, ctx: &Context) -> Reply {
        info!("[{}] query={}", self.name, query);
        let session_id = &ctx.session_id;

        // 会话命令直接旁路，不发起模型调用
        if self.clear_memory_commands.iter().any(|c| c == query) {
            self.sessions.clear_session(session_id).await;
            return Reply::info("记忆已清除");
        }
        if query == self.clear_all_command {
            self.sessions.clear_all_session().await;
            return Reply::info("所有人记忆已清除");
        }

        let session = self.sessions.session_query(query, session_id).await;
        let params = self.resolve_call_args(ctx, &session).await;
        let messages = { session.lock().await.messages().to_vec() };

        match self.reply_text(&messages, &params).await {
            TextOutcome::Completed(c) => {
                self.sessions
                    .session_reply(&c.content, session_id, c.total_tokens)
                    .await;
                Reply::text(c.content)
            }
            TextOutcome::Failed { kind } => {
                if kind.clears_session() {
                    // 无法归类的失败可能意味着上下文已损坏，整段丢弃
                    self.sessions.clear_session(session_id).await;
                }
                Reply::error(kind.user_message())
            }
        }
    }

    async fn reply_to_image_create(&self, query: &str, ctx: &Context) -> Reply {
        if !ctx.is_admin {
            return Reply::text("你让我画我就画？你以为你是谁？");
        }
        match self.provider.create_image(query).await {
            Ok(url) => {
                info!("[{}] image url: {}", self.name, url);
                Reply::image_url(url)
            }
            Err(err) => {
                warn!("[{}] create_image error: {}", self.name, err);
                Reply::error(err.user_message())
            }
        }
    }

    /// 带重试的补全调用。显式计数循环；重试上限在安排退避之前检查，
    /// 所以可重试分类最多发起 1 + MAX_RETRIES 次调用。
    pub async fn reply_text(&self, messages: &[Message], params: &GenParams) -> TextOutcome {
        let mut retry_count = 0u32;
        loop {
            match self.provider.submit(messages, params).await {
                Ok(completion) => {
                    info!("[{}] reply={}", self.name, completion.content);
                    return TextOutcome::Completed(completion);
                }
                Err(err) => {
                    warn!("[{}] reply_text error: {}", self.name, err);
                    match err.backoff() {
                        Some(delay) if retry_count < MAX_RETRIES => {
                            retry_count += 1;
                            warn!("[{}] 第{}次重试", self.name, retry_count);
                            tokio::time::sleep(delay).await;
                        }
                        _ => return TextOutcome::Failed { kind: err },
                    }
                }
            }
        }
    }

    /// 合并默认参数与按次覆盖，并在首次见到附件目录时注入文件内容
    async fn resolve_call_args(&self, ctx: &Context, session: &Arc<Mutex<Session>>) -> GenParams {
        let mut params = self.params.clone();
        if let Some(model) = ctx.get::<String>("model") {
            params.model = model;
        }
        if let Some(dir) = ctx.get::<String>("file_dir") {
            self.load_session_files(Path::new(&dir), session).await;
        }
        params
    }

    /// 把目录下的文件抽取为 system 消息，整个过程持有会话锁，
    /// 与同键的其它消息串行；files_loaded 保证每个会话只注入一次
    async fn load_session_files(&self, dir: &Path, session: &Arc<Mutex<Session>>) {
        let Some(extractor) = &self.extractor else {
            return;
        };
        if !dir.is_dir() {
            return;
        }

        let mut guard = session.lock().await;
        if guard.files_loaded() {
            return;
        }
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            match extractor.extract(entry.path()).await {
                Ok(text) => {
                    guard.push_system_context(text);
                    guard.mark_files_loaded();
                }
                Err(err) => {
                    warn!("[{}] 文件抽取失败 {}: {}", self.name, entry.path().display(), err);
                }
            }
        }
    }
}
