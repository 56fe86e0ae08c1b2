use crate::teaser::Teaser;

use super::error::PipelineWarning;

/// State carried through one processing run.
pub struct RunContext {
    /// Working copy; persisted after every stage.
    pub teaser: Teaser,

    /// Blocks merged into the analysis during this run, in order.
    pub analyzed_blocks: Vec<String>,

    /// Set when the analysis phase was skipped.
    pub skip_reason: Option<&'static str>,

    pub warnings: Vec<PipelineWarning>,
}

impl RunContext {
    pub fn new(teaser: Teaser) -> Self {
        Self {
            teaser,
            analyzed_blocks: Vec::new(),
            skip_reason: None,
            warnings: Vec::new(),
        }
    }

    pub fn record_block_failure(&mut self, block_id: &str, reason: impl Into<String>) {
        self.warnings
            .push(PipelineWarning::block_failed(block_id, reason));
    }

    pub fn failed_blocks(&self) -> Vec<String> {
        self.warnings
            .iter()
            .map(|w| match w {
                PipelineWarning::BlockFailed { block_id, .. } => block_id.clone(),
            })
            .collect()
    }
}
