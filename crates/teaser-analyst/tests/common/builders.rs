//! Stub collaborators and their builders.
//!
//! Each stub records how it was called so tests can assert on the exact
//! sequence of requests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use teaser_analyst::llm::error::Result as LlmResult;
use teaser_analyst::{
    AnalysisClient, BuildingBlock, LlmError, Reply, ReportRenderer, Teaser, TextExtractor,
};

/// LLM client that answers from a script.
///
/// Once the script runs out every request gets `fallback` (by default an
/// empty-response error).
pub struct StubClient {
    configured: bool,
    script: Mutex<VecDeque<LlmResult<Reply>>>,
    fallback: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl StubClient {
    pub fn new() -> Self {
        Self {
            configured: true,
            script: Mutex::new(VecDeque::new()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A client without credentials.
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    /// Answers every request with `text`.
    pub fn always(text: &str) -> Self {
        Self {
            fallback: Some(text.to_string()),
            ..Self::new()
        }
    }

    pub fn then_text(self, text: &str) -> Self {
        self.then(Ok(Reply::Text(text.to_string())))
    }

    pub fn then_rate_limited(self, retry_after: std::time::Duration) -> Self {
        self.then(Ok(Reply::RateLimited { retry_after }))
    }

    pub fn then_error(self, status: u16) -> Self {
        self.then(Err(LlmError::Http {
            status,
            body: "stub failure".to_string(),
        }))
    }

    pub fn then(self, reply: LlmResult<Reply>) -> Self {
        self.script
            .lock()
            .expect("script lock poisoned")
            .push_back(reply);
        self
    }

    /// One entry per request: `batch:<ids>` or the block id.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    fn respond(&self, call: String) -> LlmResult<Reply> {
        if !self.configured {
            return Err(LlmError::MissingCredentials);
        }
        self.calls.lock().expect("calls lock poisoned").push(call);
        if let Some(reply) = self.script.lock().expect("script lock poisoned").pop_front() {
            return reply;
        }
        match &self.fallback {
            Some(text) => Ok(Reply::Text(text.clone())),
            None => Err(LlmError::EmptyResponse),
        }
    }
}

#[async_trait]
impl AnalysisClient for StubClient {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn analyze_batch(&self, _text: &str, blocks: &[&BuildingBlock]) -> LlmResult<Reply> {
        let ids: Vec<&str> = blocks.iter().map(|b| b.id.as_str()).collect();
        self.respond(format!("batch:{}", ids.join(",")))
    }

    async fn analyze_block(&self, _text: &str, block: &BuildingBlock) -> LlmResult<Reply> {
        self.respond(block.id.clone())
    }
}

/// Returns the same text for every document.
pub struct StubExtractor {
    text: String,
}

impl StubExtractor {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

impl TextExtractor for StubExtractor {
    fn extract_text(&self, _pdf_bytes: &[u8]) -> String {
        self.text.clone()
    }
}

/// Writes a one-line placeholder report, or fails on purpose.
pub struct StubRenderer {
    reports_dir: Option<PathBuf>,
    rendered: Mutex<Vec<Teaser>>,
}

impl StubRenderer {
    pub fn writing_to(reports_dir: &Path) -> Self {
        Self {
            reports_dir: Some(reports_dir.to_path_buf()),
            rendered: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reports_dir: None,
            rendered: Mutex::new(Vec::new()),
        }
    }

    /// Snapshots the renderer was called with.
    pub fn rendered(&self) -> Vec<Teaser> {
        self.rendered.lock().expect("rendered lock poisoned").clone()
    }
}

#[async_trait]
impl ReportRenderer for StubRenderer {
    async fn render_report(&self, teaser: &Teaser) -> Option<PathBuf> {
        self.rendered
            .lock()
            .expect("rendered lock poisoned")
            .push(teaser.clone());
        let dir = self.reports_dir.as_ref()?;
        std::fs::create_dir_all(dir).ok()?;
        let path = dir.join(format!("teaser_{}_report.pdf", teaser.id));
        std::fs::write(&path, b"%PDF-stub").ok()?;
        Some(path)
    }
}
