//! Moonshot API 客户端（OpenAI 兼容格式）
//!
//! - Base URL: https://api.moonshot.cn/v1
//! - 模型: moonshot-v1-8k / moonshot-v1-32k / moonshot-v1-128k
//!
//! 聊天走 OpenAiChatProvider；文件接口（清理陈旧文件、上传抽取）在聊天 SDK
//! 的覆盖面之外，用 reqwest 直连。

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::config::MoonshotSection;
use crate::llm::{FileExtractor, OpenAiChatProvider, ProviderError};

/// Moonshot API 常量
pub const MOONSHOT_BASE_URL: &str = "https://api.moonshot.cn/v1";
pub const MOONSHOT_V1_8K: &str = "moonshot-v1-8k";
pub const MOONSHOT_V1_32K: &str = "moonshot-v1-32k";
pub const MOONSHOT_V1_128K: &str = "moonshot-v1-128k";

const FILES_TIMEOUT: Duration = Duration::from_secs(60);

/// 创建 Moonshot 聊天客户端
///
/// API Key 取 [moonshot].api_key，缺省回落到环境变量 `MOONSHOT_API_KEY`
pub fn create_moonshot_provider(cfg: &MoonshotSection) -> OpenAiChatProvider {
    let api_key = cfg
        .api_key
        .clone()
        .or_else(|| std::env::var("MOONSHOT_API_KEY").ok());
    OpenAiChatProvider::new("moonshot", Some(&cfg.base_url), api_key.as_deref())
}

/// Moonshot 文件接口：启动清理 + `file-extract` 用途的上传抽取
pub struct MoonshotFiles {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct FileObject {
    id: String,
}

#[derive(Deserialize)]
struct FileList {
    data: Vec<FileObject>,
}

impl MoonshotFiles {
    pub fn new(cfg: &MoonshotSection) -> Self {
        let api_key = cfg
            .api_key
            .clone()
            .or_else(|| std::env::var("MOONSHOT_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());
        Self {
            http: reqwest::Client::builder()
                .timeout(FILES_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// 删除提供方侧遗留的全部已上传文件，返回删除数量。
    /// 在 Bot 构造时调用一次，避免配额被历史上传占满。
    pub async fn clear_stale(&self) -> Result<usize, ProviderError> {
        let list: FileList = self
            .request(self.http.get(format!("{}/files", self.base_url)))
            .await?
            .json()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let mut deleted = 0;
        for file in list.data {
            info!(file_id = %file.id, "删除陈旧文件");
            self.request(
                self.http
                    .delete(format!("{}/files/{}", self.base_url, file.id)),
            )
            .await?;
            deleted += 1;
        }
        Ok(deleted)
    }

    async fn request(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = builder
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }
        Ok(response)
    }
}

#[async_trait]
impl FileExtractor for MoonshotFiles {
    async fn extract(&self, path: &Path) -> Result<String, ProviderError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ProviderError::Other(format!("read {}: {}", path.display(), e)))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let form = reqwest::multipart::Form::new()
            .text("purpose", "file-extract")
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            );

        let file: FileObject = self
            .request(
                self.http
                    .post(format!("{}/files", self.base_url))
                    .multipart(form),
            )
            .await?
            .json()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let content = self
            .request(
                self.http
                    .get(format!("{}/files/{}/content", self.base_url, file.id)),
            )
            .await?
            .text()
            .await
            .map_err(ProviderError::from_reqwest)?;

        Ok(content)
    }
}
