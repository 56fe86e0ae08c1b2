pub mod analysis;
pub mod blocks;
pub mod cli;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod extract;
pub mod llm;
pub mod pipeline;
pub mod report;
pub mod sanitize;
pub mod secrets;
pub mod storage;
pub mod teaser;
pub mod telemetry;

pub use analysis::{AnalysisNode, AnalysisTree, TaxonomyConflict};
pub use blocks::{BuildingBlock, Registry, RegistryError};
pub use config::{load_config, AnalysisStrategy, AppConfig};
pub use db::Database;
pub use entities::{Entity, EntityExtractor, EntityMap, RegexEntityExtractor};
pub use error::{ConfigError, ExtractError, ReportError, Result, StorageError, TeaserError};
pub use extract::{PdfTextExtractor, TextExtractor};
pub use llm::{AnalysisClient, LlmError, OpenAiClient, Reply};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, TeaserService};
pub use report::{PdfReportRenderer, ReportRenderer};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use teaser::{Teaser, TeaserStatus};
