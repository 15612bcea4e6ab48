//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Moonshot / ZhipuAI / Mock）

pub mod mock;
pub mod moonshot;
pub mod openai;
pub mod traits;
pub mod zhipu;

pub use mock::{MockExtractor, MockProvider};
pub use moonshot::{
    create_moonshot_provider, MoonshotFiles, MOONSHOT_BASE_URL, MOONSHOT_V1_128K, MOONSHOT_V1_32K,
    MOONSHOT_V1_8K,
};
pub use openai::OpenAiChatProvider;
pub use traits::{ChatProvider, Completion, FileExtractor, GenParams, ProviderError};
pub use zhipu::{create_zhipu_provider, ZhipuProvider, COGVIEW_3, GLM_3_TURBO, GLM_4, ZHIPU_BASE_URL};
