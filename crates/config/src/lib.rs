//! Typed engine configuration.
//!
//! Structs and TOML parsing only. Where the document comes from (file,
//! environment, flags) is the caller's business; this crate owns the
//! shape, the defaults, and the validation.

use serde::{Deserialize, Serialize};

/// The root configuration for one engine instance.
#[derive(Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Transport (LLM endpoint) settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Loop and resilience settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Log filter, e.g. "info" or "lorecall_protocol=debug"
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.transport.temperature) {
            return Err(ConfigError::ValidationError(
                "transport.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.orchestrator.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.max_iterations must be at least 1".into(),
            ));
        }
        if self.orchestrator.tool_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.tool_concurrency must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("transport", &self.transport)
            .field("orchestrator", &self.orchestrator)
            .field("log_level", &self.log_level)
            .finish()
    }
}

/// Settings for the streaming LLM endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// OpenAI-compatible base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key for the endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model identifier sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    4096
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Knobs for the agent loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum model round trips per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Concurrent tool dispatches (1 = sequential)
    #[serde(default = "default_tool_concurrency")]
    pub tool_concurrency: u32,

    /// Whole-stream timeout for one model round trip
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retries per round trip on retryable transport errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential retry backoff
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

fn default_max_iterations() -> u32 {
    4
}
fn default_tool_concurrency() -> u32 {
    1
}
fn default_request_timeout_secs() -> u64 {
    120
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_base_delay_ms() -> u64 {
    250
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tool_concurrency: default_tool_concurrency(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.orchestrator.max_iterations, 4);
        assert_eq!(config.orchestrator.tool_concurrency, 1);
        assert_eq!(config.transport.max_tokens, 4096);
        assert_eq!(config.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_document_gives_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.transport.base_url, "https://openrouter.ai/api/v1");
        assert!(config.transport.api_key.is_none());
    }

    #[test]
    fn partial_sections_fill_in() {
        let config = EngineConfig::from_toml_str(
            r#"
[transport]
model = "qwen/qwen-2.5-coder-32b-instruct"
api_key = "sk-test"

[orchestrator]
max_iterations = 2
"#,
        )
        .unwrap();

        assert_eq!(config.transport.model, "qwen/qwen-2.5-coder-32b-instruct");
        assert_eq!(config.transport.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.orchestrator.max_iterations, 2);
        // Untouched knobs keep their defaults.
        assert_eq!(config.orchestrator.max_retries, 2);
        assert!((config.transport.temperature - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let result = EngineConfig::from_toml_str(
            r#"
[transport]
temperature = 5.0
"#,
        );
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn zero_iterations_rejected() {
        let result = EngineConfig::from_toml_str(
            r#"
[orchestrator]
max_iterations = 0
"#,
        );
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let result = EngineConfig::from_toml_str("[transport\nmodel = ");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = EngineConfig::from_toml_str(
            r#"
[transport]
api_key = "sk-very-secret"
"#,
        )
        .unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = EngineConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(parsed.transport.model, config.transport.model);
        assert_eq!(
            parsed.orchestrator.request_timeout_secs,
            config.orchestrator.request_timeout_secs
        );
    }
}
