use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, field, info, info_span, warn, Instrument, Span};

use crate::analysis::{parse_sections, strip_leading_marker, AnalysisTree};
use crate::blocks::{BuildingBlock, Registry};
use crate::config::AnalysisStrategy;
use crate::db::teaser_repo::{self, BeginOutcome};
use crate::db::Database;
use crate::entities::EntityExtractor;
use crate::error::ExtractError;
use crate::extract::TextExtractor;
use crate::llm::{AnalysisClient, LlmError, Reply};
use crate::report::ReportRenderer;
use crate::sanitize;
use crate::teaser::TeaserStatus;

use super::config::PipelineConfig;
use super::context::RunContext;
use super::error::PipelineError;
use super::progress::{ProgressEvent, ProgressReporter, TeaserPhase};

/// How an analysis request ended, from the run's point of view.
enum Analysis {
    Continue,
    /// Credentials vanished mid-run; the rest of the phase is skipped.
    Skip,
}

/// Drives one teaser from its stored upload to a finished report.
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    db: Database,
    registry: Arc<Registry>,
    client: Arc<dyn AnalysisClient>,
    text_extractor: Arc<dyn TextExtractor>,
    entity_extractor: Arc<dyn EntityExtractor>,
    renderer: Arc<dyn ReportRenderer>,
}

impl Pipeline {
    pub fn new(
        config: Arc<PipelineConfig>,
        db: Database,
        registry: Arc<Registry>,
        client: Arc<dyn AnalysisClient>,
        text_extractor: Arc<dyn TextExtractor>,
        entity_extractor: Arc<dyn EntityExtractor>,
        renderer: Arc<dyn ReportRenderer>,
    ) -> Self {
        Self {
            config,
            db,
            registry,
            client,
            text_extractor,
            entity_extractor,
            renderer,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Runs the full lifecycle for one teaser.
    ///
    /// Returns `Ok(true)` when the teaser ends up COMPLETED or a run was
    /// already in progress, and `Ok(false)` when this run ended in ERROR.
    /// `Err` is returned for unknown ids and when the failure itself cannot be
    /// recorded.
    pub async fn process(
        &self,
        teaser_id: &str,
        selected_blocks: Option<&[String]>,
        progress: &dyn ProgressReporter,
    ) -> Result<bool, PipelineError> {
        let span = info_span!("pipeline", teaser_id = %teaser_id, filename = field::Empty);
        self.process_in_span(teaser_id, selected_blocks, progress)
            .instrument(span)
            .await
    }

    async fn process_in_span(
        &self,
        teaser_id: &str,
        selected_blocks: Option<&[String]>,
        progress: &dyn ProgressReporter,
    ) -> Result<bool, PipelineError> {
        match teaser_repo::begin_processing(&self.db, teaser_id, &Utc::now())? {
            BeginOutcome::NotFound => {
                return Err(PipelineError::NotFound(teaser_id.to_string()));
            }
            BeginOutcome::AlreadyProcessing => {
                info!("Teaser is already being processed; nothing to do");
                return Ok(true);
            }
            BeginOutcome::Started => {}
        }

        match self.run(teaser_id, selected_blocks, progress).await {
            Ok(ctx) => {
                info!(
                    analyzed = ctx.analyzed_blocks.len(),
                    failed = ctx.warnings.len(),
                    skipped = ctx.skip_reason.unwrap_or("no"),
                    "Teaser processing completed"
                );
                progress.report(ProgressEvent::Completed {
                    report_path: ctx.teaser.report_path.clone().unwrap_or_default(),
                    analyzed_blocks: ctx.analyzed_blocks.clone(),
                    failed_blocks: ctx.failed_blocks(),
                });
                Ok(true)
            }
            Err(e) => {
                let message = e.to_string();
                error!(error = %message, "Teaser processing failed");
                teaser_repo::mark_failed(&self.db, teaser_id, &message, &Utc::now())?;
                progress.report(ProgressEvent::Failed { error: message });
                Ok(false)
            }
        }
    }

    async fn run(
        &self,
        teaser_id: &str,
        selected_blocks: Option<&[String]>,
        progress: &dyn ProgressReporter,
    ) -> Result<RunContext, PipelineError> {
        let teaser = teaser_repo::find_by_id(&self.db, teaser_id)?
            .ok_or_else(|| PipelineError::NotFound(teaser_id.to_string()))?;
        Span::current().record("filename", teaser.filename.as_str());
        let mut ctx = RunContext::new(teaser);

        // Step 1: Extract text from the stored upload
        if ctx.teaser.extracted_text.is_none() {
            if let Some(source_path) = ctx.teaser.source_path.clone() {
                progress.report(ProgressEvent::phase(
                    TeaserPhase::Extracting,
                    "Extracting text from PDF...",
                ));
                self.step_extract_text(&mut ctx, Path::new(&source_path))
                    .instrument(info_span!("extract_text"))
                    .await?;
            }
        }

        // Step 2: Tag entities
        if ctx.teaser.entities.is_none() && ctx.teaser.has_text() {
            let _step = info_span!("tag_entities").entered();
            progress.report(ProgressEvent::phase(
                TeaserPhase::TaggingEntities,
                "Tagging named entities...",
            ));
            self.step_tag_entities(&mut ctx)?;
        }

        // Step 3: Analyze, unless a precondition is missing
        if !ctx.teaser.has_text() {
            info!("No extracted text; skipping analysis");
            ctx.skip_reason = Some("no extracted text");
        } else if !self.client.is_configured() {
            info!("No LLM credentials configured; skipping analysis");
            ctx.skip_reason = Some("no credentials");
        } else {
            progress.report(ProgressEvent::phase(
                TeaserPhase::Analyzing,
                "Analyzing teaser...",
            ));
            self.step_analyze(&mut ctx, selected_blocks)
                .instrument(info_span!("analyze", strategy = ?self.config.strategy))
                .await?;
        }

        // Step 4: Render the report and complete
        progress.report(ProgressEvent::phase(
            TeaserPhase::Rendering,
            "Rendering report...",
        ));
        self.step_render_report(&mut ctx)
            .instrument(info_span!("render_report"))
            .await?;

        Ok(ctx)
    }

    fn persist(&self, ctx: &mut RunContext) -> Result<(), PipelineError> {
        ctx.teaser.touch();
        teaser_repo::update(&self.db, &ctx.teaser)?;
        Ok(())
    }

    async fn step_extract_text(
        &self,
        ctx: &mut RunContext,
        source_path: &Path,
    ) -> Result<(), PipelineError> {
        let bytes = tokio::fs::read(source_path)
            .await
            .map_err(|e| ExtractError::ReadDocument {
                path: source_path.to_path_buf(),
                source: e,
            })?;

        let extractor = Arc::clone(&self.text_extractor);
        let text = tokio::task::spawn_blocking(move || extractor.extract_text(&bytes))
            .await
            .map_err(|e| ExtractError::TaskFailed(e.to_string()))?;

        debug!(
            source = %sanitize::redact_path(source_path),
            chars = text.chars().count(),
            "Extracted text"
        );
        ctx.teaser.extracted_text = if text.trim().is_empty() {
            None
        } else {
            Some(text)
        };
        self.persist(ctx)
    }

    fn step_tag_entities(&self, ctx: &mut RunContext) -> Result<(), PipelineError> {
        let text = ctx.teaser.extracted_text.as_deref().unwrap_or_default();
        let entities = self.entity_extractor.extract_entities(text);
        debug!(categories = entities.len(), "Tagged entities");
        ctx.teaser.entities = Some(entities);
        self.persist(ctx)
    }

    async fn step_analyze(
        &self,
        ctx: &mut RunContext,
        selected_blocks: Option<&[String]>,
    ) -> Result<(), PipelineError> {
        let blocks = self.registry.resolve_selection(selected_blocks);
        if blocks.is_empty() {
            info!("No known building blocks selected; skipping analysis");
            ctx.skip_reason = Some("empty selection");
            return Ok(());
        }
        let text = ctx.teaser.extracted_text.clone().unwrap_or_default();
        debug!(blocks = blocks.len(), text_chars = text.len(), "Starting analysis");

        let outcome = match self.config.strategy {
            AnalysisStrategy::Batched => self.analyze_batched(ctx, &text, &blocks).await?,
            AnalysisStrategy::PerBlock => self.analyze_per_block(ctx, &text, &blocks).await?,
        };
        if let Analysis::Skip = outcome {
            ctx.skip_reason = Some("no credentials");
        }
        Ok(())
    }

    async fn analyze_batched(
        &self,
        ctx: &mut RunContext,
        text: &str,
        blocks: &[&BuildingBlock],
    ) -> Result<Analysis, PipelineError> {
        let raw = match self.client.analyze_batch(text, blocks).await {
            Ok(Reply::Text(raw)) => raw,
            Ok(Reply::RateLimited { retry_after }) => {
                warn!(
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Batched analysis was rate limited; no blocks analyzed"
                );
                for block in blocks {
                    ctx.record_block_failure(&block.id, "rate limited");
                }
                return Ok(Analysis::Continue);
            }
            Err(LlmError::MissingCredentials) => {
                info!("LLM client has no credentials; skipping analysis");
                return Ok(Analysis::Skip);
            }
            Err(e) => {
                warn!(error = %e, "Batched analysis request failed");
                for block in blocks {
                    ctx.record_block_failure(&block.id, e.to_string());
                }
                return Ok(Analysis::Continue);
            }
        };

        let names: Vec<(&str, &str)> = blocks
            .iter()
            .map(|b| (b.id.as_str(), b.display_name.as_str()))
            .collect();
        let sections = parse_sections(&raw, &names);
        debug!(
            found = sections.len(),
            requested = blocks.len(),
            "Parsed batched response"
        );

        for block in blocks {
            match sections.get(&block.id) {
                Some(section) => self.merge_block(ctx, block, section)?,
                None => {
                    warn!(block_id = %block.id, "Section missing from batched response");
                    ctx.record_block_failure(&block.id, "section missing from response");
                }
            }
        }
        Ok(Analysis::Continue)
    }

    async fn analyze_per_block(
        &self,
        ctx: &mut RunContext,
        text: &str,
        blocks: &[&BuildingBlock],
    ) -> Result<Analysis, PipelineError> {
        for block in blocks {
            let mut attempts = 0u32;
            loop {
                match self.client.analyze_block(text, block).await {
                    Ok(Reply::Text(raw)) => {
                        let section = strip_leading_marker(&raw, &block.display_name);
                        if section.is_empty() {
                            warn!(block_id = %block.id, "Empty response for block");
                            ctx.record_block_failure(&block.id, "empty response");
                        } else {
                            self.merge_block(ctx, block, &section)?;
                        }
                        break;
                    }
                    Ok(Reply::RateLimited { retry_after }) => {
                        let wait = retry_after + self.config.rate_limit_buffer;
                        warn!(
                            block_id = %block.id,
                            attempt = attempts + 1,
                            wait_ms = wait.as_millis() as u64,
                            "Rate limited; waiting before next request"
                        );
                        tokio::time::sleep(wait).await;
                        if attempts >= self.config.rate_limit_retries {
                            ctx.record_block_failure(&block.id, "rate limited");
                            break;
                        }
                        attempts += 1;
                    }
                    Err(LlmError::MissingCredentials) => {
                        info!("LLM client has no credentials; skipping analysis");
                        return Ok(Analysis::Skip);
                    }
                    Err(e) => {
                        warn!(block_id = %block.id, error = %e, "Block analysis failed");
                        ctx.record_block_failure(&block.id, e.to_string());
                        break;
                    }
                }
            }
        }
        Ok(Analysis::Continue)
    }

    /// Writes one block result into the tree and commits it.
    fn merge_block(
        &self,
        ctx: &mut RunContext,
        block: &BuildingBlock,
        section: &str,
    ) -> Result<(), PipelineError> {
        ctx.teaser
            .analysis
            .get_or_insert_with(AnalysisTree::new)
            .merge(block, section)?;
        ctx.analyzed_blocks.push(block.id.clone());
        debug!(block_id = %block.id, chars = section.len(), "Merged block result");
        self.persist(ctx)
    }

    async fn step_render_report(&self, ctx: &mut RunContext) -> Result<(), PipelineError> {
        let path = self
            .renderer
            .render_report(&ctx.teaser)
            .await
            .ok_or(PipelineError::ReportNotGenerated)?;

        ctx.teaser.report_path = Some(path.display().to_string());
        ctx.teaser.status = TeaserStatus::Completed;
        ctx.teaser.error = None;
        self.persist(ctx)
    }
}
