use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::secrets::{resolve_secret_optional, SecretError};

pub const CONFIG_VERSION: &str = "1.0";
pub const DEFAULT_API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub version: String,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_uploads_directory")]
    pub uploads_directory: String,
    #[serde(default = "default_reports_directory")]
    pub reports_directory: String,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

fn default_database_path() -> String {
    "teaser-analyst.db".to_string()
}

fn default_uploads_directory() -> String {
    "uploads".to_string()
}

fn default_reports_directory() -> String {
    "reports".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            database_path: default_database_path(),
            uploads_directory: default_uploads_directory(),
            reports_directory: default_reports_directory(),
            llm: LlmConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

/// Chat-completions service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Full chat completions endpoint.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: TokenBudget,
    /// Request timeout for a batched request, in seconds.
    #[serde(default = "default_batch_timeout")]
    pub batch_timeout_secs: u64,
    /// Request timeout for a single-block request, in seconds.
    #[serde(default = "default_block_timeout")]
    pub block_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// API key given inline. Prefer a file or env var outside local testing.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: Option<String>,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-4-turbo".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_batch_timeout() -> u64 {
    180
}

fn default_block_timeout() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_api_key_env_var() -> Option<String> {
    Some(DEFAULT_API_KEY_ENV_VAR.to_string())
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: TokenBudget::default(),
            batch_timeout_secs: default_batch_timeout(),
            block_timeout_secs: default_block_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            api_key: None,
            api_key_file: None,
            api_key_env_var: default_api_key_env_var(),
        }
    }
}

impl LlmConfig {
    /// Resolves the API key. `None` means no key is available, which disables
    /// analysis rather than failing.
    pub fn resolve_api_key(&self) -> Result<Option<SecretString>, SecretError> {
        resolve_secret_optional(
            self.api_key.as_deref(),
            self.api_key_file.as_deref(),
            self.api_key_env_var.as_deref(),
        )
    }
}

/// Completion budget for a batched request: `min(upper_bound, base + n * per_block)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBudget {
    #[serde(default = "default_budget_base")]
    pub base: u32,
    #[serde(default = "default_budget_per_block")]
    pub per_block: u32,
    #[serde(default = "default_budget_upper_bound")]
    pub upper_bound: u32,
}

fn default_budget_base() -> u32 {
    1000
}

fn default_budget_per_block() -> u32 {
    150
}

fn default_budget_upper_bound() -> u32 {
    4000
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            base: default_budget_base(),
            per_block: default_budget_per_block(),
            upper_bound: default_budget_upper_bound(),
        }
    }
}

impl TokenBudget {
    pub fn for_blocks(&self, count: usize) -> u32 {
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        self.base
            .saturating_add(count.saturating_mul(self.per_block))
            .min(self.upper_bound)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStrategy {
    /// One request for all selected blocks, split by section markers.
    #[default]
    Batched,
    /// One request per block, with rate-limit waits between them.
    PerBlock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub strategy: AnalysisStrategy,
    /// Added to every rate-limit wait, in milliseconds.
    #[serde(default = "default_rate_limit_buffer")]
    pub rate_limit_buffer_ms: u64,
    /// Wait used when a 429 carries no parsable retry hint, in seconds.
    #[serde(default = "default_fallback_retry_after")]
    pub fallback_retry_after_secs: u64,
    /// How often one block is retried after being rate limited.
    #[serde(default = "default_rate_limit_retries")]
    pub rate_limit_retries: u32,
}

fn default_rate_limit_buffer() -> u64 {
    500
}

fn default_fallback_retry_after() -> u64 {
    15
}

fn default_rate_limit_retries() -> u32 {
    2
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            strategy: AnalysisStrategy::default(),
            rate_limit_buffer_ms: default_rate_limit_buffer(),
            fallback_retry_after_secs: default_fallback_retry_after(),
            rate_limit_retries: default_rate_limit_retries(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_budget_grows_then_caps() {
        let budget = TokenBudget::default();
        assert_eq!(budget.for_blocks(0), 1000);
        assert_eq!(budget.for_blocks(1), 1150);
        assert_eq!(budget.for_blocks(10), 2500);
        assert_eq!(budget.for_blocks(20), 4000);
        assert_eq!(budget.for_blocks(usize::MAX), 4000);
    }

    #[test]
    fn test_llm_config_default() {
        let config = LlmConfig::default();
        assert_eq!(config.model, "gpt-4-turbo");
        assert!((config.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.batch_timeout_secs, 180);
        assert_eq!(config.block_timeout_secs, 60);
        assert_eq!(config.api_key_env_var.as_deref(), Some("OPENAI_API_KEY"));
    }

    #[test]
    fn test_analysis_config_default() {
        let config = AnalysisConfig::default();
        assert_eq!(config.strategy, AnalysisStrategy::Batched);
        assert_eq!(config.rate_limit_buffer_ms, 500);
        assert_eq!(config.fallback_retry_after_secs, 15);
        assert_eq!(config.rate_limit_retries, 2);
    }

    #[test]
    fn test_strategy_names() {
        let strategy: AnalysisStrategy = serde_json::from_str("\"per_block\"").unwrap();
        assert_eq!(strategy, AnalysisStrategy::PerBlock);
        assert_eq!(
            serde_json::to_string(&AnalysisStrategy::Batched).unwrap(),
            "\"batched\""
        );
    }

    #[test]
    fn test_inline_api_key_resolves() {
        use secrecy::ExposeSecret;

        let config = LlmConfig {
            api_key: Some("sk-inline".to_string()),
            ..LlmConfig::default()
        };
        let key = config.resolve_api_key().unwrap().unwrap();
        assert_eq!(key.expose_secret(), "sk-inline");
    }
}
