use std::time::Duration;

use crate::config::{AnalysisStrategy, AppConfig};

/// The parts of [`AppConfig`] a processing run needs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub strategy: AnalysisStrategy,
    /// Added on top of every signalled rate-limit wait.
    pub rate_limit_buffer: Duration,
    pub rate_limit_retries: u32,
}

impl PipelineConfig {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            strategy: config.analysis.strategy,
            rate_limit_buffer: Duration::from_millis(config.analysis.rate_limit_buffer_ms),
            rate_limit_retries: config.analysis.rate_limit_retries,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}
