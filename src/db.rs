use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Result, Row};
use std::path::Path;

use crate::content::{ContentStore, DemandSink};
use crate::error::Error;
use crate::models::{
    AnswerMark, AttemptKind, AttemptRecord, BreakdownEntry, ChapterBundle, DemandReport,
    SessionToken,
};
use crate::session::HistoryStore;

const ATTEMPT_COLUMNS: &str = "id, topic_owner_id, display_title, subject_name, timestamp, kind, \
     total_questions, correct_count, breakdown, answers";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            -- Attempt history (append-only)
            CREATE TABLE IF NOT EXISTS attempts (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                learner TEXT NOT NULL,
                id TEXT NOT NULL UNIQUE,
                topic_owner_id TEXT NOT NULL,
                display_title TEXT NOT NULL,
                subject_name TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                kind TEXT NOT NULL CHECK(kind IN ('quiz', 'note_review')),
                total_questions INTEGER NOT NULL DEFAULT 0,
                correct_count INTEGER NOT NULL DEFAULT 0,
                breakdown TEXT NOT NULL DEFAULT '[]'
            );

            -- Chapter bundles keyed by precise content key
            CREATE TABLE IF NOT EXISTS content_cache (
                key TEXT PRIMARY KEY,
                bundle TEXT NOT NULL,
                stored_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- Missing content reports
            CREATE TABLE IF NOT EXISTS content_demand (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                topic_owner_id TEXT NOT NULL,
                topic_name TEXT NOT NULL,
                reported_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- One review session lease per learner
            CREATE TABLE IF NOT EXISTS active_sessions (
                learner TEXT PRIMARY KEY,
                token TEXT NOT NULL,
                acquired_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_attempts_learner_time ON attempts(learner, timestamp);
            CREATE INDEX IF NOT EXISTS idx_attempts_owner ON attempts(topic_owner_id);
            CREATE INDEX IF NOT EXISTS idx_demand_owner ON content_demand(topic_owner_id);
            "#,
        )?;

        // Run migrations for existing databases
        self.migrate()?;

        Ok(())
    }

    // Handle schema migrations for existing databases
    fn migrate(&self) -> Result<()> {
        // Per-question answers arrived after the first schema
        let has_answers: bool = self
            .conn
            .prepare("SELECT answers FROM attempts LIMIT 1")
            .is_ok();

        if !has_answers {
            self.conn.execute_batch(
                "ALTER TABLE attempts ADD COLUMN answers TEXT NOT NULL DEFAULT '[]';",
            )?;
        }

        Ok(())
    }

    // Attempt operations
    pub fn append_attempt(&self, learner: &str, record: &AttemptRecord) -> crate::error::Result<()> {
        record.validate().map_err(Error::InvalidRecord)?;

        let breakdown = serde_json::to_string(&record.topic_breakdown)?;
        let answers = serde_json::to_string(&record.answers)?;

        self.conn.execute(
            r#"
            INSERT INTO attempts (learner, id, topic_owner_id, display_title, subject_name,
                                  timestamp, kind, total_questions, correct_count, breakdown, answers)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                learner,
                record.id,
                record.topic_owner_id,
                record.display_title,
                record.subject_name,
                format_timestamp(record.timestamp),
                record.kind.as_str(),
                record.total_questions,
                record.correct_count,
                breakdown,
                answers
            ],
        )?;

        log::debug!("appended {} for {}", record.id, learner);
        Ok(())
    }

    /// Full history for a learner, oldest first.
    pub fn list_attempts(&self, learner: &str) -> Result<Vec<AttemptRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM attempts WHERE learner = ?1 ORDER BY timestamp, seq",
            ATTEMPT_COLUMNS
        ))?;

        let rows = stmt.query_map(params![learner], attempt_from_row)?;
        rows.collect::<Result<Vec<_>>>()
    }

    pub fn list_attempts_since(
        &self,
        learner: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<AttemptRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM attempts WHERE learner = ?1 AND timestamp >= ?2 ORDER BY timestamp, seq",
            ATTEMPT_COLUMNS
        ))?;

        let rows = stmt.query_map(params![learner, format_timestamp(since)], attempt_from_row)?;
        rows.collect::<Result<Vec<_>>>()
    }

    pub fn count_attempts(&self, learner: &str) -> Result<i64> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM attempts WHERE learner = ?1",
            params![learner],
            |row| row.get(0),
        )
    }

    // Content cache operations
    pub fn store_bundle(&self, key: &str, bundle: &ChapterBundle) -> crate::error::Result<()> {
        let raw = serde_json::to_string(bundle)?;
        self.conn.execute(
            r#"
            INSERT INTO content_cache (key, bundle, stored_at) VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET bundle = excluded.bundle, stored_at = excluded.stored_at
            "#,
            params![key, raw],
        )?;
        Ok(())
    }

    pub fn load_bundle(&self, key: &str) -> crate::error::Result<Option<ChapterBundle>> {
        let raw: Result<String> = self.conn.query_row(
            "SELECT bundle FROM content_cache WHERE key = ?1",
            params![key],
            |row| row.get(0),
        );

        match raw {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_bundle_keys(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM content_cache ORDER BY key")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<String>>>()
    }

    // Demand operations
    pub fn record_demand(&self, topic_owner_id: &str, topic_name: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO content_demand (topic_owner_id, topic_name, reported_at) VALUES (?1, ?2, ?3)",
            params![topic_owner_id, topic_name, format_timestamp(Utc::now())],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn list_demand(&self) -> Result<Vec<DemandReport>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, topic_owner_id, topic_name, reported_at FROM content_demand ORDER BY id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(DemandReport {
                id: row.get(0)?,
                topic_owner_id: row.get(1)?,
                topic_name: row.get(2)?,
                reported_at: row.get(3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>>>()
    }

    // Session lease operations
    pub fn active_session(&self, learner: &str) -> Result<Option<SessionToken>> {
        let lease = self.conn.query_row(
            "SELECT learner, token, acquired_at FROM active_sessions WHERE learner = ?1",
            params![learner],
            |row| {
                Ok(SessionToken {
                    learner: row.get(0)?,
                    token: row.get(1)?,
                    acquired_at: parse_timestamp(row, 2)?,
                })
            },
        );

        match lease {
            Ok(token) => Ok(Some(token)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Take the learner's session lease. A held lease is only replaced when
    /// `force` is set.
    pub fn acquire_session(&self, learner: &str, force: bool) -> crate::error::Result<SessionToken> {
        if let Some(existing) = self.active_session(learner)? {
            if !force {
                return Err(Error::SessionActive(existing.learner));
            }
            log::warn!("replacing session lease held since {}", existing.acquired_at);
        }

        let token = SessionToken {
            learner: learner.to_string(),
            token: format!("{:016x}", rand::random::<u64>()),
            acquired_at: Utc::now(),
        };

        self.conn.execute(
            "INSERT OR REPLACE INTO active_sessions (learner, token, acquired_at) VALUES (?1, ?2, ?3)",
            params![token.learner, token.token, format_timestamp(token.acquired_at)],
        )?;

        log::info!("session lease acquired for {}", learner);
        Ok(token)
    }

    pub fn release_session(&self, token: &SessionToken) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM active_sessions WHERE learner = ?1 AND token = ?2",
            params![token.learner, token.token],
        )?;
        Ok(rows > 0)
    }

    pub fn owns_session(&self, token: &SessionToken) -> Result<bool> {
        Ok(self
            .active_session(&token.learner)?
            .map_or(false, |lease| lease.token == token.token))
    }

    pub fn append_session_attempt(
        &self,
        token: &SessionToken,
        record: &AttemptRecord,
    ) -> crate::error::Result<()> {
        if !self.owns_session(token)? {
            return Err(Error::SessionNotOwned(token.learner.clone()));
        }
        self.append_attempt(&token.learner, record)
    }
}

impl HistoryStore for Database {
    fn append(&self, token: &SessionToken, record: &AttemptRecord) -> crate::error::Result<()> {
        self.append_session_attempt(token, record)
    }

    fn release(&self, token: &SessionToken) -> crate::error::Result<()> {
        if !self.release_session(token)? {
            log::warn!("session lease for {} was already gone", token.learner);
        }
        Ok(())
    }
}

impl ContentStore for Database {
    fn fetch(&self, key: &str) -> crate::error::Result<Option<ChapterBundle>> {
        self.load_bundle(key)
    }
}

impl DemandSink for Database {
    fn report_missing_content(&self, topic_owner_id: &str, topic_name: &str) -> crate::error::Result<()> {
        self.record_demand(topic_owner_id, topic_name)?;
        Ok(())
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn attempt_from_row(row: &Row<'_>) -> Result<AttemptRecord> {
    let id: String = row.get(0)?;
    let kind_str: String = row.get(5)?;
    let kind = AttemptKind::from_str(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            Type::Text,
            format!("unknown attempt kind '{}'", kind_str).into(),
        )
    })?;

    // A damaged breakdown degrades to chapter-level attribution
    let breakdown_raw: String = row.get(8)?;
    let topic_breakdown: Vec<BreakdownEntry> = serde_json::from_str(&breakdown_raw)
        .unwrap_or_else(|e| {
            log::warn!("attempt {} has an unreadable breakdown: {}", id, e);
            Vec::new()
        });

    let answers_raw: String = row.get(9)?;
    let answers: Vec<AnswerMark> = serde_json::from_str(&answers_raw).unwrap_or_else(|e| {
        log::warn!("attempt {} has unreadable answers: {}", id, e);
        Vec::new()
    });

    Ok(AttemptRecord {
        id,
        topic_owner_id: row.get(1)?,
        display_title: row.get(2)?,
        subject_name: row.get(3)?,
        timestamp: parse_timestamp(row, 4)?,
        kind,
        total_questions: row.get(6)?,
        correct_count: row.get(7)?,
        topic_breakdown,
        answers,
    })
}
