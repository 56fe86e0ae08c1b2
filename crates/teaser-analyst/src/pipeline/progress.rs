//! Progress reporting for processing runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Phase of a processing run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TeaserPhase {
    Queued,
    Extracting,
    TaggingEntities,
    Analyzing,
    Rendering,
    Completed,
    Failed,
}

impl std::fmt::Display for TeaserPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TeaserPhase::Queued => write!(f, "Queued"),
            TeaserPhase::Extracting => write!(f, "Extracting text"),
            TeaserPhase::TaggingEntities => write!(f, "Tagging entities"),
            TeaserPhase::Analyzing => write!(f, "Analyzing"),
            TeaserPhase::Rendering => write!(f, "Rendering report"),
            TeaserPhase::Completed => write!(f, "Completed"),
            TeaserPhase::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Processing,
    Completed,
    Failed,
}

/// Event sent to subscribers of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeaserProgressEvent {
    pub teaser_id: String,
    pub filename: String,
    pub phase: TeaserPhase,
    pub status: RunStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Set on completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<String>,
    /// Blocks merged into the analysis (set on completion).
    #[serde(default)]
    pub analyzed_blocks: Vec<String>,
    /// Blocks that produced no result (set on completion).
    #[serde(default)]
    pub failed_blocks: Vec<String>,
    /// Set on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TeaserProgressEvent {
    pub fn new(teaser_id: &str, filename: &str, phase: TeaserPhase, message: &str) -> Self {
        let status = match phase {
            TeaserPhase::Completed => RunStatus::Completed,
            TeaserPhase::Failed => RunStatus::Failed,
            _ => RunStatus::Processing,
        };
        Self {
            teaser_id: teaser_id.to_string(),
            filename: filename.to_string(),
            phase,
            status,
            message: message.to_string(),
            timestamp: Utc::now(),
            report_path: None,
            analyzed_blocks: vec![],
            failed_blocks: vec![],
            error: None,
        }
    }
}

/// Events emitted by the pipeline during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Phase {
        phase: TeaserPhase,
        message: String,
    },
    Completed {
        report_path: String,
        analyzed_blocks: Vec<String>,
        failed_blocks: Vec<String>,
    },
    Failed {
        error: String,
    },
}

impl ProgressEvent {
    pub fn phase(phase: TeaserPhase, message: impl Into<String>) -> Self {
        ProgressEvent::Phase {
            phase,
            message: message.into(),
        }
    }
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Discards every event.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Forwards run events to a broadcast channel. Sending never blocks and
/// events are dropped when nobody is subscribed.
pub struct BroadcastProgress {
    teaser_id: String,
    filename: String,
    sender: broadcast::Sender<TeaserProgressEvent>,
}

impl BroadcastProgress {
    pub fn new(
        teaser_id: &str,
        filename: &str,
        sender: broadcast::Sender<TeaserProgressEvent>,
    ) -> Self {
        Self {
            teaser_id: teaser_id.to_string(),
            filename: filename.to_string(),
            sender,
        }
    }

    fn send(&self, event: TeaserProgressEvent) {
        let _ = self.sender.send(event);
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        let event = match event {
            ProgressEvent::Phase { phase, message } => {
                TeaserProgressEvent::new(&self.teaser_id, &self.filename, phase, &message)
            }
            ProgressEvent::Completed {
                report_path,
                analyzed_blocks,
                failed_blocks,
            } => {
                let mut event = TeaserProgressEvent::new(
                    &self.teaser_id,
                    &self.filename,
                    TeaserPhase::Completed,
                    "Processing completed successfully",
                );
                event.report_path = Some(report_path);
                event.analyzed_blocks = analyzed_blocks;
                event.failed_blocks = failed_blocks;
                event
            }
            ProgressEvent::Failed { error } => {
                let mut event = TeaserProgressEvent::new(
                    &self.teaser_id,
                    &self.filename,
                    TeaserPhase::Failed,
                    &format!("Processing failed: {}", error),
                );
                event.error = Some(error);
                event
            }
        };
        self.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_status_follows_phase() {
        let event = TeaserProgressEvent::new("t1", "a.pdf", TeaserPhase::Analyzing, "Analyzing");
        assert_eq!(event.status, RunStatus::Processing);
        let event = TeaserProgressEvent::new("t1", "a.pdf", TeaserPhase::Failed, "x");
        assert_eq!(event.status, RunStatus::Failed);
    }

    #[test]
    fn test_event_serializes_camel_case() {
        let event = TeaserProgressEvent::new("t1", "a.pdf", TeaserPhase::TaggingEntities, "m");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["teaserId"], "t1");
        assert_eq!(json["phase"], "tagging_entities");
        assert!(json.get("reportPath").is_none());
    }

    #[tokio::test]
    async fn test_broadcast_progress_sends_events() {
        let (tx, mut rx) = broadcast::channel(8);
        let progress = BroadcastProgress::new("t1", "falcon.pdf", tx);

        progress.report(ProgressEvent::phase(TeaserPhase::Extracting, "Extracting text..."));
        progress.report(ProgressEvent::Completed {
            report_path: "reports/teaser_t1_report.pdf".to_string(),
            analyzed_blocks: vec!["risk".to_string()],
            failed_blocks: vec![],
        });

        let first = rx.recv().await.unwrap();
        assert_eq!(first.phase, TeaserPhase::Extracting);
        assert_eq!(first.filename, "falcon.pdf");

        let second = rx.recv().await.unwrap();
        assert_eq!(second.status, RunStatus::Completed);
        assert_eq!(
            second.report_path.as_deref(),
            Some("reports/teaser_t1_report.pdf")
        );
        assert_eq!(second.analyzed_blocks, vec!["risk".to_string()]);
    }

    #[test]
    fn test_broadcast_without_subscribers_is_silent() {
        let (tx, rx) = broadcast::channel(1);
        drop(rx);
        let progress = BroadcastProgress::new("t1", "a.pdf", tx);
        progress.report(ProgressEvent::Failed {
            error: "boom".to_string(),
        });
    }
}
