//! # Agora LLM
//!
//! LLM invocation gateway for Agora debates.
//!
//! ## Supported Backends
//!
//! | Model key | Provider | Enable flag | Key |
//! |-----------|----------|-------------|-----|
//! | `gemini-3-flash` | Google | `ENABLE_GOOGLE_API` | `GOOGLE_API_KEY` |
//! | `gpt-5-mini` | OpenAI | `ENABLE_OPENAI_API` | `OPENAI_API_KEY` |
//! | `claude-haiku-4.5` | Anthropic | `ENABLE_ANTHROPIC_API` | `ANTHROPIC_API_KEY` |
//! | `kimi-k2` | Moonshot | `ENABLE_MOONSHOT_API` | `MOONSHOT_API_KEY` |
//! | `exaone-4.0` | EXAONE (Friendli) | `ENABLE_EXAONE_API` | `FRIENDLI_TOKEN` |
//! | `mock` | Testing | always | None |
//!
//! ## Quick Start
//!
//! ```rust
//! use agora_core::PromptBundle;
//! use agora_llm::{Gateway, LlmConfig, ProviderRegistry, RetryPolicy};
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = ProviderRegistry::from_config(&LlmConfig::default(), &["mock"]).unwrap();
//!     let gateway = Gateway::new(registry, RetryPolicy::immediate());
//!
//!     let bundle = PromptBundle::new("[System Context]\n...", "[Timeline]\n(empty)", "[Task]\nSpeak.");
//!     let response = gateway.invoke("mock", &bundle).await.unwrap();
//!     println!("{} ({} prompt tokens)", response.content, response.usage.prompt_tokens);
//! }
//! ```

pub mod anthropic;
pub mod config;
pub mod gateway;
pub mod gemini;
pub mod mock;
pub mod openai;
pub mod provider;
pub mod registry;

pub use anthropic::AnthropicProvider;
pub use config::{model_spec, ConfigError, LlmConfig, ModelSpec, ProviderKind, MODEL_CATALOG};
pub use gateway::{Gateway, GatewayStats, RetryPolicy};
pub use gemini::{CacheApi, CacheHandle, GeminiProvider, PromptCache};
pub use mock::{smart_reply, MockProvider, MockReply};
pub use openai::OpenAiCompatibleProvider;
pub use provider::{ErrorKind, LlmError, LlmProvider, LlmResponse, TokenUsage};
pub use registry::ProviderRegistry;
