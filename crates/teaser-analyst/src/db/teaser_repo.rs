//! Teaser repository: CRUD and status transitions for the `teasers` table.
//!
//! Structured columns (`entities`, `analysis`) are stored as JSON text;
//! timestamps as RFC 3339 strings.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};
use crate::teaser::{Teaser, TeaserStatus};

/// A raw teaser row from the database.
#[derive(Debug, Clone)]
struct TeaserRow {
    id: String,
    filename: String,
    source_path: Option<String>,
    extracted_text: Option<String>,
    entities: Option<String>,
    analysis: Option<String>,
    status: String,
    report_path: Option<String>,
    error: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TeaserRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            filename: row.get("filename")?,
            source_path: row.get("source_path")?,
            extracted_text: row.get("extracted_text")?,
            entities: row.get("entities")?,
            analysis: row.get("analysis")?,
            status: row.get("status")?,
            report_path: row.get("report_path")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn from_teaser(teaser: &Teaser) -> Result<Self, DatabaseError> {
        let entities = teaser
            .entities
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|source| DatabaseError::Encode {
                column: "entities",
                source,
            })?;
        let analysis = teaser
            .analysis
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|source| DatabaseError::Encode {
                column: "analysis",
                source,
            })?;

        Ok(Self {
            id: teaser.id.clone(),
            filename: teaser.filename.clone(),
            source_path: teaser.source_path.clone(),
            extracted_text: teaser.extracted_text.clone(),
            entities,
            analysis,
            status: teaser.status.as_str().to_string(),
            report_path: teaser.report_path.clone(),
            error: teaser.error.clone(),
            created_at: teaser.created_at.to_rfc3339(),
            updated_at: teaser.updated_at.to_rfc3339(),
        })
    }

    fn into_teaser(self) -> Result<Teaser, DatabaseError> {
        let id = self.id;
        let invalid = |reason: String| DatabaseError::InvalidRow {
            id: id.clone(),
            reason,
        };

        let status = self.status.parse::<TeaserStatus>().map_err(&invalid)?;
        let entities = self
            .entities
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| invalid(format!("entities: {}", e)))?;
        let analysis = self
            .analysis
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| invalid(format!("analysis: {}", e)))?;
        let created_at = parse_timestamp(&self.created_at).map_err(&invalid)?;
        let updated_at = parse_timestamp(&self.updated_at).map_err(&invalid)?;

        Ok(Teaser {
            id: id.clone(),
            filename: self.filename,
            source_path: self.source_path,
            extracted_text: self.extracted_text,
            entities,
            analysis,
            status,
            report_path: self.report_path,
            error: self.error,
            created_at,
            updated_at,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("timestamp '{}': {}", value, e))
}

/// Result of trying to move a teaser into `processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    Started,
    AlreadyProcessing,
    NotFound,
}

/// Inserts a new teaser row.
pub fn insert(db: &Database, teaser: &Teaser) -> Result<(), DatabaseError> {
    let row = TeaserRow::from_teaser(teaser)?;
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO teasers (id, filename, source_path, extracted_text, entities, analysis,
             status, report_path, error, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                row.id,
                row.filename,
                row.source_path,
                row.extracted_text,
                row.entities,
                row.analysis,
                row.status,
                row.report_path,
                row.error,
                row.created_at,
                row.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Overwrites every column except `id` and `created_at`. Last write wins.
pub fn update(db: &Database, teaser: &Teaser) -> Result<(), DatabaseError> {
    let row = TeaserRow::from_teaser(teaser)?;
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE teasers SET filename=?2, source_path=?3, extracted_text=?4, entities=?5,
             analysis=?6, status=?7, report_path=?8, error=?9, updated_at=?10
             WHERE id=?1",
            params![
                row.id,
                row.filename,
                row.source_path,
                row.extracted_text,
                row.entities,
                row.analysis,
                row.status,
                row.report_path,
                row.error,
                row.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a teaser by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<Teaser>, DatabaseError> {
    let row = db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM teasers WHERE id = ?1",
                params![id],
                TeaserRow::from_row,
            )
            .optional()?;
        Ok(row)
    })?;
    row.map(TeaserRow::into_teaser).transpose()
}

/// All teasers, newest first.
pub fn list(db: &Database) -> Result<Vec<Teaser>, DatabaseError> {
    let rows = db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM teasers ORDER BY created_at DESC, id")?;
        let rows = stmt
            .query_map([], TeaserRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;
    rows.into_iter().map(TeaserRow::into_teaser).collect()
}

/// Deletes a teaser. Returns whether a row was removed.
pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM teasers WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
}

/// Sets status and error message.
pub fn update_status(
    db: &Database,
    id: &str,
    status: TeaserStatus,
    error: Option<&str>,
    updated_at: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE teasers SET status = ?2, error = ?3, updated_at = ?4 WHERE id = ?1",
            params![id, status.as_str(), error, updated_at.to_rfc3339()],
        )?;
        Ok(())
    })
}

/// Moves a teaser to `error` with `message` and drops any report path left
/// over from an earlier run.
pub fn mark_failed(
    db: &Database,
    id: &str,
    message: &str,
    updated_at: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE teasers SET status = ?2, error = ?3, report_path = NULL, updated_at = ?4
             WHERE id = ?1",
            params![
                id,
                TeaserStatus::Error.as_str(),
                message,
                updated_at.to_rfc3339()
            ],
        )?;
        Ok(())
    })
}

/// Atomically moves a teaser into `processing` unless it already is, and
/// clears any previous error.
pub fn begin_processing(
    db: &Database,
    id: &str,
    updated_at: &DateTime<Utc>,
) -> Result<BeginOutcome, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE teasers SET status = ?2, error = NULL, updated_at = ?3
             WHERE id = ?1 AND status != ?2",
            params![
                id,
                TeaserStatus::Processing.as_str(),
                updated_at.to_rfc3339()
            ],
        )?;
        if changed > 0 {
            return Ok(BeginOutcome::Started);
        }
        let exists = conn
            .query_row("SELECT 1 FROM teasers WHERE id = ?1", params![id], |_| Ok(()))
            .optional()?
            .is_some();
        Ok(if exists {
            BeginOutcome::AlreadyProcessing
        } else {
            BeginOutcome::NotFound
        })
    })
}

/// Moves a `processing` teaser to `error`. Returns whether the transition
/// happened; teasers in any other state are left alone.
pub fn cancel_processing(
    db: &Database,
    id: &str,
    message: &str,
    updated_at: &DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE teasers SET status = ?2, error = ?3, updated_at = ?4
             WHERE id = ?1 AND status = ?5",
            params![
                id,
                TeaserStatus::Error.as_str(),
                message,
                updated_at.to_rfc3339(),
                TeaserStatus::Processing.as_str(),
            ],
        )?;
        Ok(changed > 0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisTree;
    use crate::blocks::Registry;
    use crate::entities::{Entity, EntityMap};

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_teaser(filename: &str) -> Teaser {
        Teaser::new(filename, Some(format!("/uploads/{}", filename)))
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        let teaser = sample_teaser("falcon.pdf");
        insert(&db, &teaser).unwrap();

        let found = find_by_id(&db, &teaser.id).unwrap().unwrap();
        assert_eq!(found.filename, "falcon.pdf");
        assert_eq!(found.source_path.as_deref(), Some("/uploads/falcon.pdf"));
        assert_eq!(found.status, TeaserStatus::Pending);
        assert_eq!(found.created_at, teaser.created_at);
    }

    #[test]
    fn test_find_missing_returns_none() {
        let db = test_db();
        assert!(find_by_id(&db, "nope").unwrap().is_none());
    }

    #[test]
    fn test_update_persists_structured_columns() {
        let db = test_db();
        let mut teaser = sample_teaser("falcon.pdf");
        insert(&db, &teaser).unwrap();

        let registry = Registry::standard();
        let mut tree = AnalysisTree::new();
        tree.merge(registry.get("risk").unwrap(), "Customer concentration.")
            .unwrap();
        let mut entities = EntityMap::new();
        entities.insert(
            "PERCENT".to_string(),
            vec![Entity {
                text: "20%".to_string(),
                label: "PERCENT".to_string(),
                start_char: 3,
                end_char: 6,
            }],
        );

        teaser.extracted_text = Some("It 20% up".to_string());
        teaser.entities = Some(entities.clone());
        teaser.analysis = Some(tree.clone());
        teaser.status = TeaserStatus::Completed;
        teaser.report_path = Some("reports/x.pdf".to_string());
        teaser.touch();
        update(&db, &teaser).unwrap();

        let found = find_by_id(&db, &teaser.id).unwrap().unwrap();
        assert_eq!(found.entities, Some(entities));
        assert_eq!(found.analysis, Some(tree));
        assert_eq!(found.status, TeaserStatus::Completed);
        assert_eq!(found.report_path.as_deref(), Some("reports/x.pdf"));
    }

    #[test]
    fn test_list_and_delete() {
        let db = test_db();
        let a = sample_teaser("a.pdf");
        let b = sample_teaser("b.pdf");
        insert(&db, &a).unwrap();
        insert(&db, &b).unwrap();

        assert_eq!(list(&db).unwrap().len(), 2);
        assert!(delete(&db, &a.id).unwrap());
        assert!(!delete(&db, &a.id).unwrap());

        let remaining = list(&db).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, b.id);
    }

    #[test]
    fn test_begin_processing_is_idempotent() {
        let db = test_db();
        let teaser = sample_teaser("a.pdf");
        insert(&db, &teaser).unwrap();
        let now = Utc::now();

        assert_eq!(
            begin_processing(&db, &teaser.id, &now).unwrap(),
            BeginOutcome::Started
        );
        assert_eq!(
            begin_processing(&db, &teaser.id, &now).unwrap(),
            BeginOutcome::AlreadyProcessing
        );
        assert_eq!(
            begin_processing(&db, "missing", &now).unwrap(),
            BeginOutcome::NotFound
        );
    }

    #[test]
    fn test_begin_processing_clears_previous_error() {
        let db = test_db();
        let teaser = sample_teaser("a.pdf");
        insert(&db, &teaser).unwrap();
        let now = Utc::now();
        update_status(&db, &teaser.id, TeaserStatus::Error, Some("boom"), &now).unwrap();

        begin_processing(&db, &teaser.id, &now).unwrap();
        let found = find_by_id(&db, &teaser.id).unwrap().unwrap();
        assert_eq!(found.status, TeaserStatus::Processing);
        assert!(found.error.is_none());
    }

    #[test]
    fn test_mark_failed_clears_report_path() {
        let db = test_db();
        let mut teaser = sample_teaser("a.pdf");
        teaser.status = TeaserStatus::Completed;
        teaser.report_path = Some("reports/old.pdf".to_string());
        insert(&db, &teaser).unwrap();

        mark_failed(&db, &teaser.id, "boom", &Utc::now()).unwrap();
        let found = find_by_id(&db, &teaser.id).unwrap().unwrap();
        assert_eq!(found.status, TeaserStatus::Error);
        assert_eq!(found.error.as_deref(), Some("boom"));
        assert!(found.report_path.is_none());
    }

    #[test]
    fn test_cancel_only_from_processing() {
        let db = test_db();
        let teaser = sample_teaser("a.pdf");
        insert(&db, &teaser).unwrap();
        let now = Utc::now();

        assert!(!cancel_processing(&db, &teaser.id, "Cancelled", &now).unwrap());

        begin_processing(&db, &teaser.id, &now).unwrap();
        assert!(cancel_processing(&db, &teaser.id, "Cancelled", &now).unwrap());

        let found = find_by_id(&db, &teaser.id).unwrap().unwrap();
        assert_eq!(found.status, TeaserStatus::Error);
        assert_eq!(found.error.as_deref(), Some("Cancelled"));
        assert!(!cancel_processing(&db, &teaser.id, "Cancelled", &now).unwrap());
    }

    #[test]
    fn test_corrupt_status_is_reported() {
        let db = test_db();
        let teaser = sample_teaser("a.pdf");
        insert(&db, &teaser).unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE teasers SET status = 'weird' WHERE id = ?1",
                params![teaser.id],
            )?;
            Ok(())
        })
        .unwrap();

        let err = find_by_id(&db, &teaser.id).unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidRow { .. }));
    }
}
