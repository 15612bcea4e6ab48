//! ZhipuAI API 客户端（OpenAI 兼容格式）
//!
//! - Base URL: https://open.bigmodel.cn/api/paas/v4
//! - 模型: glm-4 (对话), cogview-3 (文生图)
//!
//! 聊天委托给 OpenAiChatProvider；图像生成端点不在聊天 SDK 的覆盖面内，
//! 用 reqwest 直连。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::config::ZhipuSection;
use crate::llm::{ChatProvider, Completion, GenParams, OpenAiChatProvider, ProviderError};
use crate::session::Message;

/// ZhipuAI API 常量
pub const ZHIPU_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";
pub const GLM_4: &str = "glm-4";
pub const GLM_3_TURBO: &str = "glm-3-turbo";
pub const COGVIEW_3: &str = "cogview-3";

/// ZhipuAI 客户端：聊天 + cogview 文生图
pub struct ZhipuProvider {
    chat: OpenAiChatProvider,
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct ImageData {
    url: String,
}

#[derive(Deserialize)]
struct ImagesResponse {
    data: Vec<ImageData>,
}

/// 创建 ZhipuAI 客户端
///
/// API Key 取 [zhipu].api_key，缺省回落到环境变量 `ZHIPU_API_KEY`
pub fn create_zhipu_provider(cfg: &ZhipuSection) -> ZhipuProvider {
    let api_key = cfg
        .api_key
        .clone()
        .or_else(|| std::env::var("ZHIPU_API_KEY").ok())
        .unwrap_or_else(|| "sk-placeholder".to_string());
    ZhipuProvider {
        chat: OpenAiChatProvider::new("zhipu", Some(&cfg.base_url), Some(&api_key)),
        http: reqwest::Client::new(),
        base_url: cfg.base_url.trim_end_matches('/').to_string(),
        api_key,
    }
}

#[async_trait]
impl ChatProvider for ZhipuProvider {
    fn name(&self) -> &str {
        "zhipu"
    }

    async fn submit(
        &self,
        messages: &[Message],
        params: &GenParams,
    ) -> Result<Completion, ProviderError> {
        self.chat.submit(messages, params).await
    }

    async fn create_image(&self, prompt: &str) -> Result<String, ProviderError> {
        let response = self
            .http
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": COGVIEW_3, "prompt": prompt }))
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }

        let images: ImagesResponse = response
            .json()
            .await
            .map_err(ProviderError::from_reqwest)?;
        let url = images
            .data
            .into_iter()
            .next()
            .map(|d| d.url)
            .ok_or_else(|| ProviderError::Other("empty image response".to_string()))?;
        info!(%url, "图像生成完成");
        Ok(url)
    }
}
