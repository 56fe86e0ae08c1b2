//! The teaser record and its lifecycle status.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisTree;
use crate::entities::EntityMap;

/// PENDING → PROCESSING → COMPLETED | ERROR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeaserStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl TeaserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeaserStatus::Pending => "pending",
            TeaserStatus::Processing => "processing",
            TeaserStatus::Completed => "completed",
            TeaserStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TeaserStatus::Completed | TeaserStatus::Error)
    }
}

impl fmt::Display for TeaserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TeaserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(TeaserStatus::Pending),
            "processing" => Ok(TeaserStatus::Processing),
            "completed" => Ok(TeaserStatus::Completed),
            "error" => Ok(TeaserStatus::Error),
            other => Err(format!("unknown teaser status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Teaser {
    pub id: String,
    pub filename: String,
    /// Stored upload, if the teaser came in as a file.
    pub source_path: Option<String>,
    pub extracted_text: Option<String>,
    pub entities: Option<EntityMap>,
    pub analysis: Option<AnalysisTree>,
    pub status: TeaserStatus,
    pub report_path: Option<String>,
    /// Message of the last failure.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Teaser {
    pub fn new(filename: impl Into<String>, source_path: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            filename: filename.into(),
            source_path,
            extracted_text: None,
            entities: None,
            analysis: None,
            status: TeaserStatus::Pending,
            report_path: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_text(&self) -> bool {
        self.extracted_text
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            TeaserStatus::Pending,
            TeaserStatus::Processing,
            TeaserStatus::Completed,
            TeaserStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<TeaserStatus>().unwrap(), status);
        }
        assert_eq!("PROCESSING".parse::<TeaserStatus>().unwrap(), TeaserStatus::Processing);
        assert!("done".parse::<TeaserStatus>().is_err());
    }

    #[test]
    fn test_new_teaser_is_pending() {
        let teaser = Teaser::new("falcon.pdf", Some("/uploads/falcon.pdf".to_string()));
        assert_eq!(teaser.status, TeaserStatus::Pending);
        assert!(!teaser.has_text());
        assert!(teaser.analysis.is_none());
        assert_eq!(teaser.created_at, teaser.updated_at);
        assert!(!teaser.status.is_terminal());
    }

    #[test]
    fn test_whitespace_text_is_not_text() {
        let mut teaser = Teaser::new("a.pdf", None);
        teaser.extracted_text = Some("  \n".to_string());
        assert!(!teaser.has_text());
    }
}
