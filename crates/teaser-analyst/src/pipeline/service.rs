use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::blocks::Registry;
use crate::config::AppConfig;
use crate::db::{teaser_repo, Database};
use crate::entities::RegexEntityExtractor;
use crate::error::TeaserError;
use crate::extract::PdfTextExtractor;
use crate::llm::OpenAiClient;
use crate::report::PdfReportRenderer;
use crate::sanitize;
use crate::storage::FileStorage;
use crate::teaser::Teaser;

use super::config::PipelineConfig;
use super::error::PipelineError;
use super::progress::{
    BroadcastProgress, ProgressEvent, ProgressReporter, TeaserPhase, TeaserProgressEvent,
};
use super::runner::Pipeline;

const PROGRESS_CHANNEL_CAPACITY: usize = 256;

/// Message stored on a teaser whose run was cancelled.
pub const CANCELLED_MESSAGE: &str = "Cancelled";

/// Entry point for callers: upload, inspect and process teasers.
#[derive(Clone)]
pub struct TeaserService {
    db: Database,
    storage: Arc<FileStorage>,
    pipeline: Arc<Pipeline>,
    progress: broadcast::Sender<TeaserProgressEvent>,
}

impl TeaserService {
    pub fn new(db: Database, storage: FileStorage, pipeline: Pipeline) -> Self {
        let (progress, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Self {
            db,
            storage: Arc::new(storage),
            pipeline: Arc::new(pipeline),
            progress,
        }
    }

    /// Production wiring: SQLite database, upload directory, OpenAI client
    /// and PDF renderer, all from `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, TeaserError> {
        let db = Database::open(Path::new(&config.database_path))?;
        let api_key = config
            .llm
            .resolve_api_key()
            .map_err(crate::error::ConfigError::from)?;
        let client = OpenAiClient::new(&config.llm, &config.analysis, api_key)?;
        let registry = Arc::new(Registry::standard());
        let renderer = PdfReportRenderer::new(&config.reports_directory, Arc::clone(&registry));

        let pipeline = Pipeline::new(
            Arc::new(PipelineConfig::from_config(config)),
            db.clone(),
            registry,
            Arc::new(client),
            Arc::new(PdfTextExtractor),
            Arc::new(RegexEntityExtractor::new()),
            Arc::new(renderer),
        );
        Ok(Self::new(
            db,
            FileStorage::new(&config.uploads_directory),
            pipeline,
        ))
    }

    pub fn registry(&self) -> &Registry {
        self.pipeline.registry()
    }

    /// Progress events for every run started through this service.
    pub fn subscribe(&self) -> broadcast::Receiver<TeaserProgressEvent> {
        self.progress.subscribe()
    }

    /// Stores the PDF and creates a PENDING teaser for it.
    pub fn upload(&self, filename: &str, content: &[u8]) -> Result<Teaser, PipelineError> {
        let stored = self.storage.store_upload(filename, content)?;
        let teaser = Teaser::new(
            filename_of(&stored, filename),
            Some(stored.display().to_string()),
        );
        if let Err(e) = teaser_repo::insert(&self.db, &teaser) {
            self.remove_file(&stored);
            return Err(e.into());
        }
        info!(
            teaser_id = %teaser.id,
            file = %sanitize::redact_path(&stored),
            bytes = content.len(),
            "Teaser uploaded"
        );
        Ok(teaser)
    }

    pub fn list(&self) -> Result<Vec<Teaser>, PipelineError> {
        Ok(teaser_repo::list(&self.db)?)
    }

    pub fn get(&self, teaser_id: &str) -> Result<Teaser, PipelineError> {
        teaser_repo::find_by_id(&self.db, teaser_id)?
            .ok_or_else(|| PipelineError::NotFound(teaser_id.to_string()))
    }

    /// Removes the record together with its stored upload and report.
    pub fn delete(&self, teaser_id: &str) -> Result<(), PipelineError> {
        let teaser = self.get(teaser_id)?;
        if !teaser_repo::delete(&self.db, teaser_id)? {
            return Err(PipelineError::NotFound(teaser_id.to_string()));
        }
        for path in [teaser.report_path.as_deref(), teaser.source_path.as_deref()]
            .into_iter()
            .flatten()
        {
            self.remove_file(Path::new(path));
        }
        info!(teaser_id = %teaser_id, "Teaser deleted");
        Ok(())
    }

    /// Runs processing to completion. See [`Pipeline::process`].
    pub async fn process(
        &self,
        teaser_id: &str,
        selected_blocks: Option<&[String]>,
    ) -> Result<bool, PipelineError> {
        let teaser = self.get(teaser_id)?;
        let progress = BroadcastProgress::new(&teaser.id, &teaser.filename, self.progress.clone());
        self.pipeline
            .process(teaser_id, selected_blocks, &progress)
            .await
    }

    /// Starts processing on a background task and returns its handle.
    ///
    /// Unknown ids are rejected before anything is spawned.
    pub fn process_in_background(
        &self,
        teaser_id: &str,
        selected_blocks: Option<Vec<String>>,
    ) -> Result<JoinHandle<Result<bool, PipelineError>>, PipelineError> {
        let teaser = self.get(teaser_id)?;
        let progress = BroadcastProgress::new(&teaser.id, &teaser.filename, self.progress.clone());
        progress.report(ProgressEvent::phase(
            TeaserPhase::Queued,
            "Queued for processing",
        ));

        let pipeline = Arc::clone(&self.pipeline);
        let teaser_id = teaser.id;
        Ok(tokio::spawn(async move {
            pipeline
                .process(&teaser_id, selected_blocks.as_deref(), &progress)
                .await
        }))
    }

    /// Marks a PROCESSING teaser as ERROR.
    ///
    /// Returns `false` for teasers in any other state. A run already in
    /// flight is not interrupted and may still write its results.
    pub fn cancel(&self, teaser_id: &str) -> Result<bool, PipelineError> {
        if teaser_repo::cancel_processing(&self.db, teaser_id, CANCELLED_MESSAGE, &Utc::now())? {
            info!(teaser_id = %teaser_id, "Teaser processing cancelled");
            return Ok(true);
        }
        // Distinguish "wrong state" from "no such teaser".
        self.get(teaser_id)?;
        Ok(false)
    }

    fn remove_file(&self, path: &Path) {
        if let Err(e) = self.storage.remove(path) {
            warn!(error = %e, "Failed to remove file");
        }
    }
}

fn filename_of(stored: &Path, fallback: &str) -> String {
    stored
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}
