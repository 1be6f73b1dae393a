//! Provider configuration and the model catalog
//!
//! Handles enable flags, API keys and the static mapping from model keys to
//! provider model ids.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Provider backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    OpenAi,
    Anthropic,
    Moonshot,
    Exaone,
    Mock,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 6] = [
        ProviderKind::Google,
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Moonshot,
        ProviderKind::Exaone,
        ProviderKind::Mock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Moonshot => "moonshot",
            ProviderKind::Exaone => "exaone",
            ProviderKind::Mock => "mock",
        }
    }

    /// Environment flag gating this provider
    pub fn enable_var(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Google => Some("ENABLE_GOOGLE_API"),
            ProviderKind::OpenAi => Some("ENABLE_OPENAI_API"),
            ProviderKind::Anthropic => Some("ENABLE_ANTHROPIC_API"),
            ProviderKind::Moonshot => Some("ENABLE_MOONSHOT_API"),
            ProviderKind::Exaone => Some("ENABLE_EXAONE_API"),
            ProviderKind::Mock => None,
        }
    }

    /// Environment variable holding the credential
    pub fn key_var(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Google => Some("GOOGLE_API_KEY"),
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderKind::Moonshot => Some("MOONSHOT_API_KEY"),
            ProviderKind::Exaone => Some("FRIENDLI_TOKEN"),
            ProviderKind::Mock => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    /// Key used in participant records and on the command line
    pub key: &'static str,
    pub provider: ProviderKind,
    /// Provider-side model id
    pub model_id: &'static str,
}

/// Known models
pub const MODEL_CATALOG: &[ModelSpec] = &[
    ModelSpec {
        key: "gemini-3-flash",
        provider: ProviderKind::Google,
        model_id: "gemini-3-flash-preview",
    },
    ModelSpec {
        key: "gpt-5-mini",
        provider: ProviderKind::OpenAi,
        model_id: "gpt-5-mini",
    },
    ModelSpec {
        key: "claude-haiku-4.5",
        provider: ProviderKind::Anthropic,
        model_id: "claude-haiku-4-5-20251001",
    },
    ModelSpec {
        key: "kimi-k2",
        provider: ProviderKind::Moonshot,
        model_id: "kimi-k2-0905-preview",
    },
    ModelSpec {
        key: "exaone-4.0",
        provider: ProviderKind::Exaone,
        model_id: "LGAI-EXAONE/K-EXAONE-236B-A23B",
    },
    ModelSpec {
        key: "mock",
        provider: ProviderKind::Mock,
        model_id: "mock",
    },
];

/// Look a model key up in the catalog
pub fn model_spec(key: &str) -> Option<&'static ModelSpec> {
    MODEL_CATALOG.iter().find(|m| m.key == key)
}

fn flag(value: Option<String>) -> bool {
    value
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Enabled providers (env: ENABLE_{PROVIDER}_API)
    pub enabled: Vec<ProviderKind>,
    /// Google API key (env: GOOGLE_API_KEY)
    pub google_api_key: Option<String>,
    /// OpenAI API key (env: OPENAI_API_KEY)
    pub openai_api_key: Option<String>,
    /// Anthropic API key (env: ANTHROPIC_API_KEY)
    pub anthropic_api_key: Option<String>,
    /// Moonshot API key (env: MOONSHOT_API_KEY)
    pub moonshot_api_key: Option<String>,
    /// Friendli token for EXAONE (env: FRIENDLI_TOKEN)
    pub friendli_token: Option<String>,
    /// EXAONE endpoint (env: EXAONE_BASE_URL)
    pub exaone_base_url: String,
    /// EXAONE model id override (env: EXAONE_MODEL)
    pub exaone_model: Option<String>,
    /// Sampling temperature (env: LLM_TEMPERATURE)
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: vec![ProviderKind::Mock],
            google_api_key: None,
            openai_api_key: None,
            anthropic_api_key: None,
            moonshot_api_key: None,
            friendli_token: None,
            exaone_base_url: "https://api.friendli.ai/serverless/v1".to_string(),
            exaone_model: None,
            temperature: 0.7,
        }
    }
}

impl LlmConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let enabled = ProviderKind::ALL
            .iter()
            .copied()
            .filter(|p| match p.enable_var() {
                Some(var) => flag(lookup(var)),
                None => true,
            })
            .collect();

        let temperature = match non_empty(lookup("LLM_TEMPERATURE")) {
            Some(raw) => raw
                .parse::<f32>()
                .map_err(|_| ConfigError::Invalid(format!("LLM_TEMPERATURE must be a number, got '{}'", raw)))?,
            None => defaults.temperature,
        };
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::Invalid(format!(
                "LLM_TEMPERATURE must be within 0.0..=2.0, got {}",
                temperature
            )));
        }

        Ok(Self {
            enabled,
            google_api_key: non_empty(lookup("GOOGLE_API_KEY")),
            openai_api_key: non_empty(lookup("OPENAI_API_KEY")),
            anthropic_api_key: non_empty(lookup("ANTHROPIC_API_KEY")),
            moonshot_api_key: non_empty(lookup("MOONSHOT_API_KEY")),
            friendli_token: non_empty(lookup("FRIENDLI_TOKEN")),
            exaone_base_url: non_empty(lookup("EXAONE_BASE_URL")).unwrap_or(defaults.exaone_base_url),
            exaone_model: non_empty(lookup("EXAONE_MODEL")),
            temperature,
        })
    }

    pub fn is_enabled(&self, provider: ProviderKind) -> bool {
        self.enabled.contains(&provider)
    }

    /// Get API key for a provider
    pub fn api_key(&self, provider: ProviderKind) -> Option<&str> {
        match provider {
            ProviderKind::Google => self.google_api_key.as_deref(),
            ProviderKind::OpenAi => self.openai_api_key.as_deref(),
            ProviderKind::Anthropic => self.anthropic_api_key.as_deref(),
            ProviderKind::Moonshot => self.moonshot_api_key.as_deref(),
            ProviderKind::Exaone => self.friendli_token.as_deref(),
            ProviderKind::Mock => None,
        }
    }

    /// Catalog keys whose provider is enabled
    pub fn enabled_models(&self) -> Vec<&'static str> {
        MODEL_CATALOG
            .iter()
            .filter(|m| self.is_enabled(m.provider))
            .map(|m| m.key)
            .collect()
    }

    /// Provider-side model id, honouring the EXAONE override
    pub fn model_id(&self, spec: &ModelSpec) -> String {
        match (spec.provider, &self.exaone_model) {
            (ProviderKind::Exaone, Some(id)) => id.clone(),
            _ => spec.model_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<LlmConfig, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        LlmConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_only_mock_enabled_by_default() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.enabled_models(), vec!["mock"]);
        assert_eq!(cfg.temperature, 0.7);
    }

    #[test]
    fn test_enable_flags() {
        let cfg = config(&[
            ("ENABLE_OPENAI_API", "True"),
            ("ENABLE_GOOGLE_API", "yes"),
            ("ENABLE_ANTHROPIC_API", "false"),
            ("OPENAI_API_KEY", "sk-test"),
        ])
        .unwrap();
        assert_eq!(cfg.enabled_models(), vec!["gemini-3-flash", "gpt-5-mini", "mock"]);
        assert_eq!(cfg.api_key(ProviderKind::OpenAi), Some("sk-test"));
        assert_eq!(cfg.api_key(ProviderKind::Google), None);
    }

    #[test]
    fn test_bad_temperature_is_rejected() {
        assert!(config(&[("LLM_TEMPERATURE", "warm")]).is_err());
        assert!(config(&[("LLM_TEMPERATURE", "5")]).is_err());
        assert_eq!(config(&[("LLM_TEMPERATURE", "0.2")]).unwrap().temperature, 0.2);
    }

    #[test]
    fn test_exaone_model_override() {
        let cfg = config(&[("EXAONE_MODEL", "\"LGAI-EXAONE/EXAONE-4.0-32B\"")]).unwrap();
        let spec = model_spec("exaone-4.0").unwrap();
        assert_eq!(cfg.model_id(spec), "LGAI-EXAONE/EXAONE-4.0-32B");
    }
}
