//! Screening report: shapes a teaser's analysis into ordered sections and
//! renders them to PDF.

pub mod pdf;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, info_span, Instrument};

use crate::blocks::Registry;
use crate::entities::EntityMap;
use crate::error::ReportError;
use crate::teaser::Teaser;

use pdf::{wrap, PdfLine, TEXT_COLUMNS};

/// Shown for a block the analysis did not populate.
fn placeholder(block_id: &str) -> &'static str {
    match block_id {
        "teaser_summary" => "This section provides a bias-conscious summary of the teaser document, highlighting key points while acknowledging potential biases in the presentation of information.",
        "company_profile" => "Product, Business Model, Form, Geography, Status",
        "customer_demand" => "Analysis of target customers and market demand patterns.",
        "industry_landscape" => "Overview of the industry and competitive positioning.",
        "commercial_strategy" => "Go-to-market approach and revenue strategy.",
        "talent_development" => "Team structure, expertise, and development plans.",
        "market_growth" => "Analysis of market trajectory and emerging trends.",
        "breadth_analysis" => "Assessment of market breadth and potential for expansion.",
        "forces_analysis" => "Analysis of external forces affecting the business.",
        "moat_identification" => "Competitive advantages and barriers to entry.",
        "value_creation" => "Factors that will drive value creation and associated risks.",
        "ownership_structure" => "Analysis of executive compensation and ownership structure.",
        "related_party" => "Assessment of related-party transactions and potential conflicts of interest.",
        "share_repurchases" => "History and strategy of share repurchase programs.",
        "dividends" => "Dividend history and policy.",
        "risk" => "Comprehensive risk assessment and mitigation strategies.",
        "synergies" => "Potential revenue and cost synergies.",
        "investment_criteria" => "Key criteria for investment decision-making.",
        "exit_perspective" => "Potential exit strategies and timelines.",
        "graveyard" => "Failed competitors or previous attempts in this space.",
        _ => "No data available for this section.",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportItem {
    /// `level` is the depth in the taxonomy, starting at 1.
    Heading { level: usize, text: String },
    Body {
        block_id: String,
        text: String,
        /// False when `text` is the placeholder.
        populated: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityRow {
    pub text: String,
    pub start_char: usize,
    pub end_char: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityGroup {
    pub category: String,
    pub rows: Vec<EntityRow>,
}

/// Everything the renderer needs, already in reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportDocument {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub items: Vec<ReportItem>,
    pub appendix: Vec<EntityGroup>,
}

impl ReportDocument {
    pub fn populated_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item, ReportItem::Body { populated: true, .. }))
            .count()
    }

    pub fn to_pdf_lines(&self) -> Vec<PdfLine> {
        let mut lines = vec![
            PdfLine::Title(self.title.clone()),
            PdfLine::Text(format!(
                "Generated on: {}",
                self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
            )),
            PdfLine::Blank,
        ];

        for item in &self.items {
            match item {
                ReportItem::Heading { level, text } => {
                    if *level == 1 {
                        lines.push(PdfLine::Blank);
                    }
                    let indent = "  ".repeat(level.saturating_sub(1));
                    lines.push(PdfLine::Heading(format!("{}{}", indent, text)));
                }
                ReportItem::Body { text, .. } => {
                    lines.extend(wrap(text, TEXT_COLUMNS).into_iter().map(PdfLine::Text));
                    lines.push(PdfLine::Blank);
                }
            }
        }

        if !self.appendix.is_empty() {
            lines.push(PdfLine::Blank);
            lines.push(PdfLine::Heading("Appendix: Extracted Entities".to_string()));
            for group in &self.appendix {
                lines.push(PdfLine::Heading(group.category.clone()));
                lines.push(PdfLine::Text(format!("{:<64} {:>9} {:>9}", "Text", "Start", "End")));
                for row in &group.rows {
                    let text: String = row.text.chars().take(64).collect();
                    lines.push(PdfLine::Text(format!(
                        "{:<64} {:>9} {:>9}",
                        text, row.start_char, row.end_char
                    )));
                }
                lines.push(PdfLine::Blank);
            }
        }

        lines
    }
}

/// Shapes a teaser into report sections.
///
/// Blocks appear in registry order. A heading is emitted for every taxonomy
/// level entered; top-level headings are numbered.
pub fn assemble(teaser: &Teaser, registry: &Registry, generated_at: DateTime<Utc>) -> ReportDocument {
    let mut items = Vec::new();
    let mut previous: &[String] = &[];
    let mut top_level = 0;

    for block in registry.blocks() {
        let path = block.taxonomy_path.as_slice();
        let shared = previous
            .iter()
            .zip(path)
            .take_while(|(a, b)| a == b)
            .count();

        for (depth, key) in path.iter().enumerate().skip(shared) {
            let text = if depth == 0 {
                top_level += 1;
                format!("{}. {}", top_level, key)
            } else {
                key.clone()
            };
            items.push(ReportItem::Heading {
                level: depth + 1,
                text,
            });
        }

        let body = teaser
            .analysis
            .as_ref()
            .and_then(|tree| tree.block_text(block))
            .filter(|text| !text.trim().is_empty());
        items.push(match body {
            Some(text) => ReportItem::Body {
                block_id: block.id.clone(),
                text: text.to_string(),
                populated: true,
            },
            None => ReportItem::Body {
                block_id: block.id.clone(),
                text: placeholder(&block.id).to_string(),
                populated: false,
            },
        });

        previous = path;
    }

    ReportDocument {
        title: format!("Teaser Analysis Report: {}", teaser.filename),
        generated_at,
        items,
        appendix: teaser.entities.as_ref().map(entity_appendix).unwrap_or_default(),
    }
}

fn entity_appendix(entities: &EntityMap) -> Vec<EntityGroup> {
    entities
        .iter()
        .filter(|(_, list)| !list.is_empty())
        .map(|(category, list)| EntityGroup {
            category: category.clone(),
            rows: list
                .iter()
                .map(|e| EntityRow {
                    text: e.text.clone(),
                    start_char: e.start_char,
                    end_char: e.end_char,
                })
                .collect(),
        })
        .collect()
}

/// Produces the report file for a teaser snapshot.
///
/// `None` means no report was produced; the run ends in error.
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    async fn render_report(&self, teaser: &Teaser) -> Option<PathBuf>;
}

/// Writes `teaser_<id>_report.pdf` into the reports directory.
pub struct PdfReportRenderer {
    reports_dir: PathBuf,
    registry: Arc<Registry>,
}

impl PdfReportRenderer {
    pub fn new<P: AsRef<Path>>(reports_dir: P, registry: Arc<Registry>) -> Self {
        Self {
            reports_dir: reports_dir.as_ref().to_path_buf(),
            registry,
        }
    }

    pub fn report_path(&self, teaser_id: &str) -> PathBuf {
        self.reports_dir.join(format!("teaser_{}_report.pdf", teaser_id))
    }
}

fn write_report(document: &ReportDocument, dir: &Path, path: &Path) -> Result<(), ReportError> {
    std::fs::create_dir_all(dir).map_err(|source| ReportError::CreateDirectory {
        path: dir.to_path_buf(),
        source,
    })?;
    let bytes = pdf::write_pdf(&document.to_pdf_lines())?;
    std::fs::write(path, bytes).map_err(|source| ReportError::WriteFile {
        path: path.to_path_buf(),
        source,
    })
}

#[async_trait]
impl ReportRenderer for PdfReportRenderer {
    async fn render_report(&self, teaser: &Teaser) -> Option<PathBuf> {
        let span = info_span!("report.render", teaser_id = %teaser.id);
        let document = assemble(teaser, &self.registry, Utc::now());
        let path = self.report_path(&teaser.id);
        let reports_dir = self.reports_dir.clone();

        let task_path = path.clone();
        let written =
            tokio::task::spawn_blocking(move || write_report(&document, &reports_dir, &task_path))
                .instrument(span.clone())
                .await;

        let _entered = span.enter();
        match written {
            Ok(Ok(())) => {
                info!(path = %crate::sanitize::redact_path(&path), "Report written");
                Some(path)
            }
            Ok(Err(e)) => {
                error!(error = %e, "Report rendering failed");
                None
            }
            Err(e) => {
                error!(error = %e, "Report rendering task panicked");
                None
            }
        }
    }
}
