//! Test harness for isolated test execution.
//!
//! The `TestHarness` struct provides a complete isolated environment for
//! exercising the teaser lifecycle, including:
//! - Temporary upload and report directories
//! - An in-memory database
//! - A `TeaserService` wired to stub or real collaborators

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use teaser_analyst::db::teaser_repo;
use teaser_analyst::storage::FileStorage;
use teaser_analyst::{
    AnalysisStrategy, Database, PdfReportRenderer, PdfTextExtractor, Pipeline, PipelineConfig,
    RegexEntityExtractor, Registry, ReportRenderer, Teaser, TeaserService, TextExtractor,
};

use super::builders::{StubClient, StubExtractor, StubRenderer};

/// Text every stub extraction returns unless configured otherwise.
pub const DEFAULT_TEXT: &str = "Acme Corp revenue grew 20%.";

/// Test harness providing isolated execution environment for integration tests.
pub struct TestHarness {
    /// Temporary directory containing uploads and reports.
    temp_dir: TempDir,
    pub uploads_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub db: Database,
    pub client: Arc<StubClient>,
    /// Present unless the harness uses the real PDF renderer.
    pub renderer: Option<Arc<StubRenderer>>,
    pub service: TeaserService,
}

impl TestHarness {
    /// Batched strategy, stub extractor returning [`DEFAULT_TEXT`], stub
    /// renderer writing into `reports_dir`.
    pub fn new(client: StubClient) -> Self {
        Self::builder(client).build()
    }

    pub fn builder(client: StubClient) -> HarnessBuilder {
        HarnessBuilder {
            client,
            strategy: AnalysisStrategy::Batched,
            extracted_text: DEFAULT_TEXT.to_string(),
            renderer: RendererKind::Stub,
            pdf_extractor: false,
        }
    }

    /// Get the base temp directory path.
    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Uploads a minimal PDF under `filename`.
    pub fn upload(&self, filename: &str) -> Teaser {
        self.service
            .upload(filename, b"%PDF-1.5\n%stub\n")
            .expect("upload failed")
    }

    pub fn reload(&self, teaser_id: &str) -> Teaser {
        teaser_repo::find_by_id(&self.db, teaser_id)
            .expect("database read failed")
            .expect("teaser missing")
    }

    pub fn rendered_snapshots(&self) -> Vec<Teaser> {
        self.renderer
            .as_ref()
            .map(|r| r.rendered())
            .unwrap_or_default()
    }
}

enum RendererKind {
    Stub,
    Failing,
    Pdf,
}

/// Builder for [`TestHarness`].
pub struct HarnessBuilder {
    client: StubClient,
    strategy: AnalysisStrategy,
    extracted_text: String,
    renderer: RendererKind,
    pdf_extractor: bool,
}

impl HarnessBuilder {
    pub fn strategy(mut self, strategy: AnalysisStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn extracted_text(mut self, text: &str) -> Self {
        self.extracted_text = text.to_string();
        self
    }

    /// Renderer that never produces a file.
    pub fn failing_renderer(mut self) -> Self {
        self.renderer = RendererKind::Failing;
        self
    }

    /// Real lopdf text extraction and PDF report rendering.
    pub fn with_pdf_stack(mut self) -> Self {
        self.renderer = RendererKind::Pdf;
        self.pdf_extractor = true;
        self
    }

    pub fn build(self) -> TestHarness {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let uploads_dir = temp_dir.path().join("uploads");
        let reports_dir = temp_dir.path().join("reports");
        let db = Database::open_in_memory().expect("Failed to open database");
        let registry = Arc::new(Registry::standard());

        let stub = match self.renderer {
            RendererKind::Stub => Some(Arc::new(StubRenderer::writing_to(&reports_dir))),
            RendererKind::Failing => Some(Arc::new(StubRenderer::failing())),
            RendererKind::Pdf => None,
        };
        let renderer: Arc<dyn ReportRenderer> = match &stub {
            Some(stub) => stub.clone(),
            None => Arc::new(PdfReportRenderer::new(&reports_dir, Arc::clone(&registry))),
        };

        let extractor: Arc<dyn TextExtractor> = if self.pdf_extractor {
            Arc::new(PdfTextExtractor)
        } else {
            Arc::new(StubExtractor::new(&self.extracted_text))
        };

        let config = PipelineConfig {
            strategy: self.strategy,
            rate_limit_buffer: Duration::from_millis(500),
            rate_limit_retries: 2,
        };
        let client = Arc::new(self.client);
        let pipeline = Pipeline::new(
            Arc::new(config),
            db.clone(),
            registry,
            client.clone(),
            extractor,
            Arc::new(RegexEntityExtractor::new()),
            renderer,
        );
        let service = TeaserService::new(db.clone(), FileStorage::new(&uploads_dir), pipeline);

        TestHarness {
            temp_dir,
            uploads_dir,
            reports_dir,
            db,
            client,
            renderer: stub,
            service,
        }
    }
}
