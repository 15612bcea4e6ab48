//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；
//! Moonshot、ZhipuAI 与自建代理都走这一个实现。错误分类在此边界完成一次。

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::{ChatProvider, Completion, GenParams, ProviderError};
use crate::session::{Message, Role};

/// OpenAI 兼容客户端：持有 Client 与标识名，submit 时转 Message 为 API 格式并取首条 content
pub struct OpenAiChatProvider {
    client: Client<OpenAIConfig>,
    name: String,
}

impl OpenAiChatProvider {
    pub fn new(name: impl Into<String>, base_url: Option<&str>, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            name: name.into(),
        }
    }

    fn to_openai_messages(&self, messages: &[Message]) -> Vec<ChatCompletionRequestMessage> {
        messages
            .iter()
            .map(|m| match m.role {
                Role::System => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .unwrap(),
                ),
                Role::User => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .unwrap(),
                ),
                Role::Assistant => ChatCompletionRequestMessage::Assistant(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .unwrap(),
                ),
            })
            .collect()
    }
}

/// 把 SDK 错误折算成分类；每个失败只在这里归类一次
fn classify(err: OpenAIError) -> ProviderError {
    match err {
        OpenAIError::Reqwest(e) => ProviderError::from_reqwest(e),
        OpenAIError::ApiError(e) => {
            let tag = e.r#type.as_deref().unwrap_or("").to_lowercase();
            let msg = e.message.to_lowercase();
            if tag.contains("rate_limit") || msg.contains("rate limit") || msg.contains("429") {
                ProviderError::RateLimited(e.message)
            } else if tag.contains("server_error")
                || tag.contains("overloaded")
                || msg.contains("bad gateway")
                || msg.contains("internal error")
            {
                ProviderError::TransientServer(e.message)
            } else {
                ProviderError::Other(e.message)
            }
        }
        other => ProviderError::Other(other.to_string()),
    }
}

#[async_trait]
impl ChatProvider for OpenAiChatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(
        &self,
        messages: &[Message],
        params: &GenParams,
    ) -> Result<Completion, ProviderError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&params.model)
            .temperature(params.temperature)
            .top_p(params.top_p)
            .messages(self.to_openai_messages(messages))
            .build()
            .map_err(classify)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(classify)?;

        let (total_tokens, completion_tokens) = response
            .usage
            .as_ref()
            .map(|u| (u.total_tokens as u64, u.completion_tokens as u64))
            .unwrap_or((0, 0));

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default()
            .replace("<|endoftext|>", "")
            .trim()
            .to_string();

        Ok(Completion {
            content,
            total_tokens,
            completion_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::error::ApiError;

    fn api_error(r#type: Option<&str>, message: &str) -> OpenAIError {
        OpenAIError::ApiError(ApiError {
            message: message.to_string(),
            r#type: r#type.map(String::from),
            param: None,
            code: None,
        })
    }

    #[test]
    fn test_classify_rate_limit() {
        let err = classify(api_error(Some("rate_limit_reached_error"), "too many requests"));
        assert!(matches!(err, ProviderError::RateLimited(_)));
    }

    #[test]
    fn test_classify_server_error() {
        let err = classify(api_error(Some("server_error"), "upstream exploded"));
        assert!(matches!(err, ProviderError::TransientServer(_)));
    }

    #[test]
    fn test_classify_unknown_is_other() {
        let err = classify(api_error(Some("invalid_request_error"), "bad field"));
        assert!(matches!(err, ProviderError::Other(_)));
    }
}
