//! Provider client registry
//!
//! Each model's client is constructed at most once per run and shared by
//! every call through the gateway.

use std::collections::HashMap;
use std::sync::Arc;

use crate::anthropic::AnthropicProvider;
use crate::config::{model_spec, LlmConfig, ProviderKind};
use crate::gemini::GeminiProvider;
use crate::mock::MockProvider;
use crate::openai::OpenAiCompatibleProvider;
use crate::provider::{LlmError, LlmProvider};

/// Model key to provider client
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build clients for exactly the given model keys
    pub fn from_config<S: AsRef<str>>(config: &LlmConfig, models: &[S]) -> Result<Self, LlmError> {
        let mut registry = Self::new();
        for key in models {
            let key = key.as_ref();
            if registry.providers.contains_key(key) {
                continue;
            }
            let provider = build_provider(config, key)?;
            tracing::debug!(model = key, provider = provider.name(), "Provider client created");
            registry.register(key, provider);
        }
        Ok(registry)
    }

    /// Register a client under a model key, replacing any previous one
    pub fn register(&mut self, key: &str, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(key.to_string(), provider);
    }

    /// Builder form of [`ProviderRegistry::register`]
    pub fn with(mut self, key: &str, provider: Arc<dyn LlmProvider>) -> Self {
        self.register(key, provider);
        self
    }

    pub fn get(&self, key: &str) -> Result<Arc<dyn LlmProvider>, LlmError> {
        self.providers
            .get(key)
            .cloned()
            .ok_or_else(|| LlmError::UnknownModel(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.providers.contains_key(key)
    }

    /// Registered model keys, sorted
    pub fn models(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

fn build_provider(config: &LlmConfig, key: &str) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let spec = model_spec(key).ok_or_else(|| LlmError::UnknownModel(key.to_string()))?;
    if !config.is_enabled(spec.provider) {
        return Err(LlmError::Disabled(format!(
            "model {} needs {}=true",
            key,
            spec.provider.enable_var().unwrap_or("its enable flag")
        )));
    }

    let credential = || {
        config.api_key(spec.provider).map(str::to_string).ok_or_else(|| {
            LlmError::MissingCredentials(spec.provider.key_var().unwrap_or("API key").to_string())
        })
    };
    let model_id = config.model_id(spec);

    let provider: Arc<dyn LlmProvider> = match spec.provider {
        ProviderKind::Google => Arc::new(GeminiProvider::new(&credential()?, &model_id, config.temperature)),
        ProviderKind::OpenAi => Arc::new(OpenAiCompatibleProvider::openai(&credential()?, &model_id)),
        ProviderKind::Moonshot => Arc::new(
            OpenAiCompatibleProvider::moonshot(&credential()?, &model_id).with_temperature(config.temperature),
        ),
        ProviderKind::Exaone => Arc::new(
            OpenAiCompatibleProvider::new("exaone", &config.exaone_base_url, &credential()?, &model_id)
                .with_temperature(config.temperature),
        ),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(&credential()?, &model_id, config.temperature)),
        ProviderKind::Mock => Arc::new(MockProvider::smart()),
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_is_always_buildable() {
        let registry = ProviderRegistry::from_config(&LlmConfig::default(), &["mock", "mock"]).unwrap();
        assert_eq!(registry.models(), vec!["mock"]);
        assert!(registry.get("mock").is_ok());
    }

    #[test]
    fn test_disabled_and_unknown_models_are_permanent() {
        let err = ProviderRegistry::from_config(&LlmConfig::default(), &["gpt-5-mini"]).unwrap_err();
        assert!(matches!(err, LlmError::Disabled(_)));
        assert!(err.is_permanent());

        let err = ProviderRegistry::from_config(&LlmConfig::default(), &["llama-9000"]).unwrap_err();
        assert!(matches!(err, LlmError::UnknownModel(_)));
    }

    #[test]
    fn test_enabled_without_key_is_missing_credentials() {
        let config = LlmConfig {
            enabled: vec![ProviderKind::Anthropic],
            ..LlmConfig::default()
        };
        let err = ProviderRegistry::from_config(&config, &["claude-haiku-4.5"]).unwrap_err();
        assert!(matches!(err, LlmError::MissingCredentials(ref v) if v == "ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_register_overrides() {
        let registry = ProviderRegistry::new().with("gpt-5-mini", Arc::new(MockProvider::constant("hi")));
        assert!(registry.contains("gpt-5-mini"));
        assert!(matches!(registry.get("kimi-k2"), Err(LlmError::UnknownModel(_))));
    }
}
