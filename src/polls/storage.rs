//! SQLite storage for historical polls and the events around them.
//!
//! Each operation opens its own connection. JSON-valued fields
//! (`demographic_slice`, `response_data`) are stored as TEXT columns.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::utilities::errors::StorageError;
use crate::utilities::paths::db_storage_path;

/// Database file name used when no path is given.
pub const DEFAULT_POLL_DB: &str = "historical_polls.db";

/// Wildcard slice value matching every respondent.
pub const ANY: &str = "any";

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

string_enum! {
    pub enum EventType {
        Economic => "economic",
        Political => "political",
        Social => "social",
        Health => "health",
        International => "international",
    }
}

string_enum! {
    pub enum EventMagnitude {
        Local => "local",
        National => "national",
        Global => "global",
    }
}

string_enum! {
    /// When a poll was taken relative to an event.
    pub enum EventRelationship {
        Before => "before",
        During => "during",
        After => "after",
    }
}

/// Value of one demographic slice key: a single value (possibly `"any"`)
/// or a list of accepted values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SliceValue {
    Many(Vec<String>),
    One(String),
}

impl SliceValue {
    pub fn any() -> Self {
        Self::One(ANY.to_string())
    }

    /// Whether a respondent with `value` falls inside this slice.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::One(v) => v == ANY || v == value,
            Self::Many(values) => values.iter().any(|v| v == value),
        }
    }
}

impl From<&str> for SliceValue {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

/// Demographic slice of a poll, keyed by `age_range`, `race_ethnicity`,
/// `education`, `location_type`, `income`, ...
pub type DemographicSlice = BTreeMap<String, SliceValue>;

/// Whether every filter key present in `slice` accepts the filter value.
/// Keys the slice does not mention never exclude a poll.
pub fn slice_matches(slice: &DemographicSlice, filters: &BTreeMap<String, String>) -> bool {
    filters
        .iter()
        .all(|(key, value)| slice.get(key).map_or(true, |s| s.matches(value)))
}

/// One historical poll result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollRecord {
    pub poll_id: String,
    /// "Gallup", "Pew Research", ...
    pub source: String,
    /// ISO date, `YYYY-MM-DD`.
    pub date: String,
    pub topic: String,
    pub question: String,
    pub demographic_slice: DemographicSlice,
    /// Response category to share.
    pub response_data: BTreeMap<String, f64>,
    pub sample_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin_of_error: Option<f64>,
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
}

fn default_confidence_level() -> f64 {
    0.95
}

impl PollRecord {
    pub fn new(
        poll_id: impl Into<String>,
        source: impl Into<String>,
        date: impl Into<String>,
        topic: impl Into<String>,
        question: impl Into<String>,
        sample_size: u32,
    ) -> Self {
        Self {
            poll_id: poll_id.into(),
            source: source.into(),
            date: date.into(),
            topic: topic.into(),
            question: question.into(),
            demographic_slice: DemographicSlice::new(),
            response_data: BTreeMap::new(),
            sample_size,
            margin_of_error: None,
            confidence_level: default_confidence_level(),
        }
    }

    pub fn with_slice(mut self, key: impl Into<String>, value: impl Into<SliceValue>) -> Self {
        self.demographic_slice.insert(key.into(), value.into());
        self
    }

    pub fn with_response(mut self, category: impl Into<String>, share: f64) -> Self {
        self.response_data.insert(category.into(), share);
        self
    }

    /// Poll date, if it parses.
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        let day = self.date.get(..10).unwrap_or(&self.date);
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }

    /// Leading response and its share.
    pub fn main_response(&self) -> Option<(&str, f64)> {
        self.response_data
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, v)| (k.as_str(), *v))
    }
}

/// Major event that moved public opinion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MajorEvent {
    pub event_id: String,
    pub name: String,
    pub date: String,
    pub event_type: EventType,
    pub description: String,
    pub magnitude: EventMagnitude,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

/// An event linked to a poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedEvent {
    pub event: MajorEvent,
    pub relationship: EventRelationship,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_offset: Option<i64>,
}

/// Filters for [`PollDatabase::query_polls`]. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollQuery {
    pub topic: Option<String>,
    pub source: Option<String>,
    /// Inclusive ISO date range.
    pub date_range: Option<(String, String)>,
    pub demographic_filters: BTreeMap<String, String>,
}

impl PollQuery {
    pub fn topic(topic: impl Into<String>) -> Self {
        Self {
            topic: Some(topic.into()),
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.demographic_filters.insert(key.into(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// PollDatabase
// ---------------------------------------------------------------------------

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<MajorEvent> {
    Ok(MajorEvent {
        event_id: row.get(0)?,
        name: row.get(1)?,
        date: row.get(2)?,
        event_type: parse_column(row, 3)?,
        description: row.get(4)?,
        magnitude: parse_column(row, 5)?,
        duration_days: row.get(6)?,
        end_date: row.get(7)?,
    })
}

const POLL_COLUMNS: &str = "poll_id, source, date, topic, question, demographic_slice, \
                            response_data, sample_size, margin_of_error, confidence_level";

const EVENT_COLUMNS: &str =
    "event_id, name, date, event_type, description, magnitude, duration_days, end_date";

/// Raw poll row with JSON columns still encoded.
struct PollRow {
    poll_id: String,
    source: String,
    date: String,
    topic: String,
    question: String,
    demographic_slice: String,
    response_data: String,
    sample_size: u32,
    margin_of_error: Option<f64>,
    confidence_level: Option<f64>,
}

impl PollRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            poll_id: row.get(0)?,
            source: row.get(1)?,
            date: row.get(2)?,
            topic: row.get(3)?,
            question: row.get(4)?,
            demographic_slice: row.get(5)?,
            response_data: row.get(6)?,
            sample_size: row.get(7)?,
            margin_of_error: row.get(8)?,
            confidence_level: row.get(9)?,
        })
    }

    fn decode(self) -> Result<PollRecord, StorageError> {
        Ok(PollRecord {
            poll_id: self.poll_id,
            source: self.source,
            date: self.date,
            topic: self.topic,
            question: self.question,
            demographic_slice: serde_json::from_str(&self.demographic_slice)?,
            response_data: serde_json::from_str(&self.response_data)?,
            sample_size: self.sample_size,
            margin_of_error: self.margin_of_error,
            confidence_level: self.confidence_level.unwrap_or_else(default_confidence_level),
        })
    }
}

/// SQLite-backed poll and event store.
#[derive(Debug, Clone)]
pub struct PollDatabase {
    pub db_path: PathBuf,
}

impl PollDatabase {
    /// Open (creating if needed) the database at `db_path`, defaulting to
    /// `<db_storage_path>/historical_polls.db`.
    pub fn new(db_path: Option<PathBuf>) -> Result<Self, StorageError> {
        let db_path = db_path.unwrap_or_else(|| db_storage_path().join(DEFAULT_POLL_DB));
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
            "CREATE TABLE IF NOT EXISTS polls (
                poll_id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                date TEXT NOT NULL,
                topic TEXT NOT NULL,
                question TEXT NOT NULL,
                demographic_slice TEXT NOT NULL,
                response_data TEXT NOT NULL,
                sample_size INTEGER NOT NULL,
                margin_of_error REAL,
                confidence_level REAL DEFAULT 0.95,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS major_events (
                event_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                date TEXT NOT NULL,
                event_type TEXT NOT NULL,
                description TEXT NOT NULL,
                magnitude TEXT NOT NULL,
                duration_days INTEGER,
                end_date TEXT,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS event_poll_relationships (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id TEXT NOT NULL,
                poll_id TEXT NOT NULL,
                relationship_type TEXT NOT NULL,
                days_offset INTEGER,
                FOREIGN KEY (event_id) REFERENCES major_events (event_id),
                FOREIGN KEY (poll_id) REFERENCES polls (poll_id)
            );",
        )?;
        Ok(())
    }

    /// Insert or replace a poll.
    pub fn add_poll(&self, poll: &PollRecord) -> Result<(), StorageError> {
        let slice = serde_json::to_string(&poll.demographic_slice)?;
        let responses = serde_json::to_string(&poll.response_data)?;
        let conn = self.connect()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO polls ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                POLL_COLUMNS
            ),
            params![
                poll.poll_id,
                poll.source,
                poll.date,
                poll.topic,
                poll.question,
                slice,
                responses,
                poll.sample_size,
                poll.margin_of_error,
                poll.confidence_level,
            ],
        )?;
        log::debug!("Stored poll {}", poll.poll_id);
        Ok(())
    }

    /// Insert or replace an event.
    pub fn add_event(&self, event: &MajorEvent) -> Result<(), StorageError> {
        let conn = self.connect()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO major_events ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                EVENT_COLUMNS
            ),
            params![
                event.event_id,
                event.name,
                event.date,
                event.event_type.as_str(),
                event.description,
                event.magnitude.as_str(),
                event.duration_days,
                event.end_date,
            ],
        )?;
        log::debug!("Stored event {}", event.event_id);
        Ok(())
    }

    /// Look up one poll.
    pub fn get_poll(&self, poll_id: &str) -> Result<Option<PollRecord>, StorageError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM polls WHERE poll_id = ?1",
            POLL_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![poll_id], PollRow::from_row)?;
        let first = rows.next().transpose()?;
        first.map(PollRow::decode).transpose()
    }

    /// Polls matching `query`, newest first. SQL narrows by topic, source and
    /// date; demographic filters are applied to the decoded slices.
    pub fn query_polls(&self, query: &PollQuery) -> Result<Vec<PollRecord>, StorageError> {
        let mut sql = format!("SELECT {} FROM polls WHERE 1=1", POLL_COLUMNS);
        let mut args: Vec<String> = Vec::new();
        if let Some(topic) = &query.topic {
            args.push(topic.clone());
            sql.push_str(&format!(" AND topic = ?{}", args.len()));
        }
        if let Some(source) = &query.source {
            args.push(source.clone());
            sql.push_str(&format!(" AND source = ?{}", args.len()));
        }
        if let Some((start, end)) = &query.date_range {
            args.push(start.clone());
            args.push(end.clone());
            sql.push_str(&format!(
                " AND date BETWEEN ?{} AND ?{}",
                args.len() - 1,
                args.len()
            ));
        }
        sql.push_str(" ORDER BY date DESC, poll_id");

        let conn = self.connect()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), PollRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut polls = Vec::with_capacity(rows.len());
        for row in rows {
            let poll = row.decode()?;
            if slice_matches(&poll.demographic_slice, &query.demographic_filters) {
                polls.push(poll);
            }
        }
        Ok(polls)
    }

    /// [`query_polls`](Self::query_polls) on the blocking thread pool.
    pub async fn aquery_polls(&self, query: PollQuery) -> Result<Vec<PollRecord>, StorageError> {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.query_polls(&query))
            .await
            .map_err(|e| StorageError::Task {
                message: e.to_string(),
            })?
    }

    /// Events dated within `[start, end]`, oldest first.
    pub fn find_events_by_timeframe(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<MajorEvent>, StorageError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM major_events WHERE date BETWEEN ?1 AND ?2 ORDER BY date",
            EVENT_COLUMNS
        ))?;
        let events = stmt
            .query_map(params![start, end], event_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// Record that `poll_id` was taken before, during or after `event_id`.
    pub fn link_event_to_poll(
        &self,
        event_id: &str,
        poll_id: &str,
        relationship: EventRelationship,
        days_offset: Option<i64>,
    ) -> Result<(), StorageError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO event_poll_relationships (event_id, poll_id, relationship_type, days_offset)
             VALUES (?1, ?2, ?3, ?4)",
            params![event_id, poll_id, relationship.as_str(), days_offset],
        )?;
        Ok(())
    }

    /// Events linked to `poll_id`, oldest first.
    pub fn events_for_poll(&self, poll_id: &str) -> Result<Vec<LinkedEvent>, StorageError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT e.event_id, e.name, e.date, e.event_type, e.description, e.magnitude,
                    e.duration_days, e.end_date, r.relationship_type, r.days_offset
             FROM event_poll_relationships r
             JOIN major_events e ON e.event_id = r.event_id
             WHERE r.poll_id = ?1
             ORDER BY e.date",
        )?;
        let linked = stmt
            .query_map(params![poll_id], |row| {
                Ok(LinkedEvent {
                    event: event_from_row(row)?,
                    relationship: parse_column(row, 8)?,
                    days_offset: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(linked)
    }

    /// Number of stored polls.
    pub fn count_polls(&self) -> Result<usize, StorageError> {
        let conn = self.connect()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM polls", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
