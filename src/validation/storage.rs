//! Validation records and their SQLite store.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings so that string
//! comparison in SQL orders them chronologically.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::polls::storage::{DemographicSlice, PollRecord};
use crate::utilities::errors::StorageError;
use crate::utilities::paths::db_storage_path;

pub const DEFAULT_VALIDATION_DB: &str = "validation_data.db";

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A historical poll used as ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationTarget {
    pub validation_id: String,
    pub source_poll: PollRecord,
    /// Expected share per response label.
    pub expected_results: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demographic_filter: Option<DemographicSlice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_date: Option<DateTime<Utc>>,
}

impl ValidationTarget {
    /// Target for `poll`, id `val_{poll_id}_{YYYYMMDD}`.
    pub fn from_poll(poll: PollRecord, now: DateTime<Utc>) -> Self {
        let demographic_filter = if poll.demographic_slice.is_empty() {
            None
        } else {
            Some(poll.demographic_slice.clone())
        };
        Self {
            validation_id: format!("val_{}_{}", poll.poll_id, now.format("%Y%m%d")),
            expected_results: poll.response_data.clone(),
            demographic_filter,
            validation_date: Some(now),
            source_poll: poll,
        }
    }
}

/// Where a prediction went wrong.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorAnalysis {
    /// Largest absolute per-label error over the expected labels.
    pub largest_error: f64,
    /// Predicted minus expected, per expected label.
    pub category_errors: BTreeMap<String, f64>,
    /// Simulated personas minus poll respondents.
    pub sample_size_difference: i64,
}

/// Outcome of comparing one simulation to one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub validation_id: String,
    pub scenario_id: String,
    /// Topic of the source poll.
    pub topic: String,
    pub predicted_results: BTreeMap<String, f64>,
    pub actual_results: BTreeMap<String, f64>,
    /// 0 to 1, 1 being a perfect match.
    pub accuracy_score: f64,
    pub demographic_accuracy: BTreeMap<String, f64>,
    pub error_analysis: ErrorAnalysis,
    pub confidence_calibration: f64,
    pub validation_timestamp: DateTime<Utc>,
}

/// One row of the accuracy tracking log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyRecord {
    /// ISO date the accuracy was measured.
    pub date: String,
    pub topic: Option<String>,
    pub demographic_group: Option<String>,
    pub accuracy_score: f64,
    pub sample_size: Option<u32>,
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// ValidationDatabase
// ---------------------------------------------------------------------------

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Start of a `days`-long window ending at `now`, never before the epoch.
fn history_cutoff(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    let epoch = DateTime::<Utc>::UNIX_EPOCH;
    Duration::try_days(days)
        .and_then(|span| now.checked_sub_signed(span))
        .map_or(epoch, |cutoff| cutoff.max(epoch))
}

fn parse_timestamp(text: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

const RESULT_COLUMNS: &str = "validation_id, scenario_id, topic, predicted_results, \
                              actual_results, accuracy_score, demographic_accuracy, \
                              error_analysis, confidence_calibration, validation_timestamp";

/// Raw result row with JSON columns still encoded.
struct ResultRow {
    validation_id: String,
    scenario_id: String,
    topic: Option<String>,
    predicted_results: String,
    actual_results: String,
    accuracy_score: f64,
    demographic_accuracy: Option<String>,
    error_analysis: Option<String>,
    confidence_calibration: Option<f64>,
    validation_timestamp: DateTime<Utc>,
}

impl ResultRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let timestamp: String = row.get(9)?;
        Ok(Self {
            validation_id: row.get(0)?,
            scenario_id: row.get(1)?,
            topic: row.get(2)?,
            predicted_results: row.get(3)?,
            actual_results: row.get(4)?,
            accuracy_score: row.get(5)?,
            demographic_accuracy: row.get(6)?,
            error_analysis: row.get(7)?,
            confidence_calibration: row.get(8)?,
            validation_timestamp: parse_timestamp(&timestamp, 9)?,
        })
    }

    fn decode(self) -> Result<ValidationResult, StorageError> {
        let demographic_accuracy = match self.demographic_accuracy {
            Some(json) => serde_json::from_str(&json)?,
            None => BTreeMap::new(),
        };
        let error_analysis = match self.error_analysis {
            Some(json) => serde_json::from_str(&json)?,
            None => ErrorAnalysis::default(),
        };
        Ok(ValidationResult {
            validation_id: self.validation_id,
            scenario_id: self.scenario_id,
            topic: self.topic.unwrap_or_else(|| "general".to_string()),
            predicted_results: serde_json::from_str(&self.predicted_results)?,
            actual_results: serde_json::from_str(&self.actual_results)?,
            accuracy_score: self.accuracy_score,
            demographic_accuracy,
            error_analysis,
            confidence_calibration: self.confidence_calibration.unwrap_or(0.5),
            validation_timestamp: self.validation_timestamp,
        })
    }
}

/// SQLite store for validation targets, results and the accuracy log.
#[derive(Debug, Clone)]
pub struct ValidationDatabase {
    pub db_path: PathBuf,
}

impl ValidationDatabase {
    /// Open (creating if needed) the database at `db_path`, defaulting to
    /// `<db_storage_path>/validation_data.db`.
    pub fn new(db_path: Option<PathBuf>) -> Result<Self, StorageError> {
        let db_path = db_path.unwrap_or_else(|| db_storage_path().join(DEFAULT_VALIDATION_DB));
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Self { db_path };
        db.init_database()?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection, StorageError> {
        Ok(Connection::open(&self.db_path)?)
    }

    fn init_database(&self) -> Result<(), StorageError> {
        let conn = self.connect()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS validation_targets (
                validation_id TEXT PRIMARY KEY,
                source_poll_id TEXT NOT NULL,
                expected_results TEXT NOT NULL,
                demographic_filter TEXT,
                validation_date TEXT,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS validation_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                validation_id TEXT NOT NULL,
                scenario_id TEXT NOT NULL,
                topic TEXT,
                predicted_results TEXT NOT NULL,
                actual_results TEXT NOT NULL,
                accuracy_score REAL NOT NULL,
                demographic_accuracy TEXT,
                error_analysis TEXT,
                confidence_calibration REAL,
                validation_timestamp TEXT NOT NULL,
                FOREIGN KEY (validation_id) REFERENCES validation_targets (validation_id)
            );
            CREATE TABLE IF NOT EXISTS accuracy_tracking (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                topic TEXT,
                demographic_group TEXT,
                accuracy_score REAL NOT NULL,
                sample_size INTEGER,
                notes TEXT,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            );",
        )?;
        Ok(())
    }

    /// Insert or replace a target.
    pub fn add_validation_target(&self, target: &ValidationTarget) -> Result<(), StorageError> {
        let expected = serde_json::to_string(&target.expected_results)?;
        let filter = target
            .demographic_filter
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let conn = self.connect()?;
        conn.execute(
            "INSERT OR REPLACE INTO validation_targets
             (validation_id, source_poll_id, expected_results, demographic_filter, validation_date)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                target.validation_id,
                target.source_poll.poll_id,
                expected,
                filter,
                target.validation_date.as_ref().map(format_timestamp),
            ],
        )?;
        log::debug!("Stored validation target {}", target.validation_id);
        Ok(())
    }

    /// Number of stored targets.
    pub fn count_validation_targets(&self) -> Result<usize, StorageError> {
        let conn = self.connect()?;
        let n: i64 =
            conn.query_row("SELECT COUNT(*) FROM validation_targets", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Append a result.
    pub fn add_validation_result(&self, result: &ValidationResult) -> Result<(), StorageError> {
        let predicted = serde_json::to_string(&result.predicted_results)?;
        let actual = serde_json::to_string(&result.actual_results)?;
        let demographic = serde_json::to_string(&result.demographic_accuracy)?;
        let errors = serde_json::to_string(&result.error_analysis)?;
        let conn = self.connect()?;
        conn.execute(
            &format!(
                "INSERT INTO validation_results ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                RESULT_COLUMNS
            ),
            params![
                result.validation_id,
                result.scenario_id,
                result.topic,
                predicted,
                actual,
                result.accuracy_score,
                demographic,
                errors,
                result.confidence_calibration,
                format_timestamp(&result.validation_timestamp),
            ],
        )?;
        Ok(())
    }

    /// Results stamped after `cutoff`, newest first.
    pub fn results_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<ValidationResult>, StorageError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM validation_results
             WHERE validation_timestamp > ?1
             ORDER BY validation_timestamp DESC, id DESC",
            RESULT_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![format_timestamp(&cutoff)], ResultRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ResultRow::decode).collect()
    }

    /// Results from the last `days` days, newest first.
    ///
    /// Spans reaching past the epoch return the whole history.
    pub fn get_accuracy_history(&self, days: i64) -> Result<Vec<ValidationResult>, StorageError> {
        self.results_since(history_cutoff(Utc::now(), days))
    }

    /// Append to the accuracy tracking log.
    pub fn record_accuracy(&self, record: &AccuracyRecord) -> Result<(), StorageError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO accuracy_tracking
             (date, topic, demographic_group, accuracy_score, sample_size, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.date,
                record.topic,
                record.demographic_group,
                record.accuracy_score,
                record.sample_size,
                record.notes,
            ],
        )?;
        Ok(())
    }

    /// Store `result` and its accuracy log entry on the blocking thread pool.
    pub async fn asave_validation(
        &self,
        result: ValidationResult,
        record: AccuracyRecord,
    ) -> Result<ValidationResult, StorageError> {
        let db = self.clone();
        tokio::task::spawn_blocking(move || -> Result<ValidationResult, StorageError> {
            db.add_validation_result(&result)?;
            db.record_accuracy(&record)?;
            Ok(result)
        })
        .await
        .map_err(|e| StorageError::Task {
            message: e.to_string(),
        })?
    }

    /// Accuracy log entries, optionally for one topic, oldest first.
    pub fn accuracy_records(&self, topic: Option<&str>) -> Result<Vec<AccuracyRecord>, StorageError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT date, topic, demographic_group, accuracy_score, sample_size, notes
             FROM accuracy_tracking
             WHERE ?1 IS NULL OR topic = ?1
             ORDER BY date, id",
        )?;
        let records = stmt
            .query_map(params![topic], |row| {
                Ok(AccuracyRecord {
                    date: row.get(0)?,
                    topic: row.get(1)?,
                    demographic_group: row.get(2)?,
                    accuracy_score: row.get(3)?,
                    sample_size: row.get(4)?,
                    notes: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{SubsecRound, TimeZone};
    use tempfile::TempDir;

    fn db() -> (TempDir, ValidationDatabase) {
        let dir = TempDir::new().unwrap();
        let db = ValidationDatabase::new(Some(dir.path().join("validation.db"))).unwrap();
        (dir, db)
    }

    fn result(id: &str, accuracy: f64, at: DateTime<Utc>) -> ValidationResult {
        ValidationResult {
            validation_id: id.to_string(),
            scenario_id: format!("validation_{id}"),
            topic: "healthcare".to_string(),
            predicted_results: BTreeMap::from([("support".to_string(), 0.6)]),
            actual_results: BTreeMap::from([("support".to_string(), 0.73)]),
            accuracy_score: accuracy,
            demographic_accuracy: BTreeMap::from([("education".to_string(), 0.8)]),
            error_analysis: ErrorAnalysis {
                largest_error: 0.13,
                category_errors: BTreeMap::from([("support".to_string(), -0.13)]),
                sample_size_difference: -1100,
            },
            confidence_calibration: 0.5,
            validation_timestamp: at,
        }
    }

    #[test]
    fn test_target_from_poll() {
        let poll = PollRecord::new("gallup_hc", "Gallup", "2024-01-15", "healthcare", "q", 1200)
            .with_slice("education", "college")
            .with_response("support", 0.7);
        let now = Utc.with_ymd_and_hms(2026, 3, 5, 10, 0, 0).unwrap();
        let target = ValidationTarget::from_poll(poll, now);
        assert_eq!(target.validation_id, "val_gallup_hc_20260305");
        assert_eq!(target.expected_results["support"], 0.7);
        assert!(target.demographic_filter.is_some());

        let bare = PollRecord::new("p", "s", "2024-01-01", "t", "q", 10);
        assert!(ValidationTarget::from_poll(bare, now).demographic_filter.is_none());
    }

    #[test]
    fn test_target_upsert() {
        let (_dir, db) = db();
        let poll = PollRecord::new("p1", "Gallup", "2024-01-15", "healthcare", "q", 1200);
        let target = ValidationTarget::from_poll(poll, Utc::now());
        db.add_validation_target(&target).unwrap();
        db.add_validation_target(&target).unwrap();
        assert_eq!(db.count_validation_targets().unwrap(), 1);
    }

    #[test]
    fn test_results_round_trip_newest_first() {
        let (_dir, db) = db();
        // stored with microsecond precision
        let now = Utc::now().trunc_subsecs(6);
        let older = result("val_a", 0.8, now - Duration::hours(2));
        let newer = result("val_b", 0.9, now - Duration::minutes(5));
        let stale = result("val_c", 0.4, now - Duration::days(45));
        for r in [&older, &newer, &stale] {
            db.add_validation_result(r).unwrap();
        }

        let history = db.get_accuracy_history(30).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], newer);
        assert_eq!(history[1], older);

        let all = db.results_since(now - Duration::days(365)).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_history_window_beyond_calendar_range() {
        let (_dir, db) = db();
        let long_ago = Utc.with_ymd_and_hms(1999, 6, 1, 0, 0, 0).unwrap();
        db.add_validation_result(&result("val_old", 0.6, long_ago)).unwrap();

        for days in [200_000_000, i64::MAX] {
            let history = db.get_accuracy_history(days).unwrap();
            assert_eq!(history.len(), 1);
            assert_eq!(history[0].validation_id, "val_old");
        }

        let now = Utc.with_ymd_and_hms(2026, 3, 5, 10, 0, 0).unwrap();
        assert_eq!(history_cutoff(now, i64::MAX), DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(history_cutoff(now, 1), now - Duration::days(1));
    }

    #[tokio::test]
    async fn test_save_validation_on_blocking_pool() {
        let (_dir, db) = db();
        let now = Utc::now().trunc_subsecs(6);
        let record = AccuracyRecord {
            date: now.format("%Y-%m-%d").to_string(),
            topic: Some("healthcare".to_string()),
            demographic_group: None,
            accuracy_score: 0.8,
            sample_size: Some(40),
            notes: Some("val_a".to_string()),
        };
        let saved = db
            .asave_validation(result("val_a", 0.8, now), record)
            .await
            .unwrap();
        assert_eq!(saved.validation_id, "val_a");

        let history = db.get_accuracy_history(1).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].validation_timestamp, now);
        let log = db.accuracy_records(Some("healthcare")).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].notes.as_deref(), Some("val_a"));
    }

    #[test]
    fn test_accuracy_tracking() {
        let (_dir, db) = db();
        for (date, topic, score) in [
            ("2026-01-02", "economy", 0.7),
            ("2026-01-01", "healthcare", 0.8),
            ("2026-01-03", "healthcare", 0.9),
        ] {
            db.record_accuracy(&AccuracyRecord {
                date: date.to_string(),
                topic: Some(topic.to_string()),
                demographic_group: None,
                accuracy_score: score,
                sample_size: Some(100),
                notes: None,
            })
            .unwrap();
        }
        let healthcare = db.accuracy_records(Some("healthcare")).unwrap();
        let dates: Vec<_> = healthcare.iter().map(|r| r.date.as_str()).collect();
        assert_eq!(dates, vec!["2026-01-01", "2026-01-03"]);
        assert_eq!(db.accuracy_records(None).unwrap().len(), 3);
    }
}
