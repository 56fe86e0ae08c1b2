use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Teaser not found: {0}")]
    NotFound(String),

    #[error("Persistence failed: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error(transparent)]
    Taxonomy(#[from] crate::analysis::TaxonomyConflict),

    #[error("Text extraction failed: {0}")]
    Extract(#[from] crate::error::ExtractError),

    #[error("Storage failed: {0}")]
    Storage(#[from] crate::error::StorageError),

    #[error("Report generation failed: renderer produced no file")]
    ReportNotGenerated,
}

/// Non-fatal problems recorded during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineWarning {
    BlockFailed { block_id: String, reason: String },
}

impl PipelineWarning {
    pub fn block_failed(block_id: &str, reason: impl Into<String>) -> Self {
        PipelineWarning::BlockFailed {
            block_id: block_id.to_string(),
            reason: reason.into(),
        }
    }
}
