pub mod loader;
pub mod schema;

pub use loader::{default_config_path, load_config, load_config_from_str, ConfigFormat};
pub use schema::{
    AnalysisConfig, AnalysisStrategy, AppConfig, LlmConfig, TokenBudget, CONFIG_VERSION,
    DEFAULT_API_KEY_ENV_VAR,
};
