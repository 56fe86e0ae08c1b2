use std::path::{Path, PathBuf};

use crate::config::schema::{AppConfig, CONFIG_VERSION};
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// YAML for `.yaml`/`.yml`, JSON otherwise.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Json,
        }
    }
}

/// `<config dir>/teaser-analyst/config.yaml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("teaser-analyst").join("config.yaml"))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content, ConfigFormat::from_path(path))
}

pub fn load_config_from_str(content: &str, format: ConfigFormat) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = match format {
        ConfigFormat::Json => serde_json::from_str(content)?,
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
    };

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    let invalid = |message: String| Err(ConfigError::Validation { message });

    if config.version != CONFIG_VERSION {
        return invalid(format!("Unsupported config version: {}", config.version));
    }

    for (name, value) in [
        ("database_path", &config.database_path),
        ("uploads_directory", &config.uploads_directory),
        ("reports_directory", &config.reports_directory),
    ] {
        if value.trim().is_empty() {
            return invalid(format!("{} must not be empty", name));
        }
    }

    let llm = &config.llm;
    if llm.model.trim().is_empty() {
        return invalid("llm.model must not be empty".to_string());
    }
    if !llm.base_url.starts_with("http://") && !llm.base_url.starts_with("https://") {
        return invalid(format!(
            "llm.base_url must be an http(s) URL: {}",
            llm.base_url
        ));
    }
    if !(0.0..=2.0).contains(&llm.temperature) {
        return invalid(format!(
            "llm.temperature must be between 0 and 2, got {}",
            llm.temperature
        ));
    }
    if llm.batch_timeout_secs == 0 || llm.block_timeout_secs == 0 || llm.connect_timeout_secs == 0
    {
        return invalid("llm timeouts must be positive".to_string());
    }
    if llm.max_tokens.base > llm.max_tokens.upper_bound {
        return invalid(format!(
            "llm.max_tokens.base ({}) exceeds upper_bound ({})",
            llm.max_tokens.base, llm.max_tokens.upper_bound
        ));
    }

    Ok(())
}
