//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Subsystems call store methods — they never execute SQL directly.

use crate::{
    config::WeightConfig,
    error::PulseResult,
    event::EventLogEntry,
    signal::Engineer,
    types::{EngineerLevel, Period},
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};

mod action;
mod alert;
mod score;
mod signal;

pub struct PulseStore {
    conn: Connection,
}

impl PulseStore {
    pub fn open(path: &str) -> PulseResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> PulseResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> PulseResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_scores.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_alerts.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_actions.sql"))?;
        Ok(())
    }

    // ── Engineer roster ────────────────────────────────────────

    pub fn insert_engineer(&self, e: &Engineer) -> PulseResult<()> {
        self.conn.execute(
            "INSERT INTO engineer (engineer_id, name, level, project, started_period)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &e.engineer_id,
                &e.name,
                e.level.id(),
                &e.project,
                e.started_period as i64,
            ],
        )?;
        Ok(())
    }

    pub fn get_engineer(&self, engineer_id: &str) -> PulseResult<Option<Engineer>> {
        let mut stmt = self.conn.prepare(
            "SELECT engineer_id, name, level, project, started_period
             FROM engineer WHERE engineer_id = ?1",
        )?;
        let result = stmt
            .query_row(params![engineer_id], engineer_row_mapper)
            .ok();
        Ok(result)
    }

    pub fn list_engineers(&self) -> PulseResult<Vec<Engineer>> {
        let mut stmt = self.conn.prepare(
            "SELECT engineer_id, name, level, project, started_period
             FROM engineer ORDER BY engineer_id ASC",
        )?;
        let rows = stmt.query_map([], engineer_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn engineers_in_project(&self, project: &str) -> PulseResult<Vec<Engineer>> {
        let mut stmt = self.conn.prepare(
            "SELECT engineer_id, name, level, project, started_period
             FROM engineer WHERE project = ?1 ORDER BY engineer_id ASC",
        )?;
        let rows = stmt.query_map(params![project], engineer_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// External reassignment: level/project are the only mutable fields.
    pub fn update_engineer_assignment(
        &self,
        engineer_id: &str,
        level: EngineerLevel,
        project: &str,
    ) -> PulseResult<()> {
        self.conn.execute(
            "UPDATE engineer SET level = ?1, project = ?2 WHERE engineer_id = ?3",
            params![level.id(), project, engineer_id],
        )?;
        Ok(())
    }

    // ── Weight config versions ─────────────────────────────────

    /// The current (highest-version) weight set, if any was written.
    pub fn current_weights(&self) -> PulseResult<Option<(u64, WeightConfig)>> {
        let mut stmt = self.conn.prepare(
            "SELECT version, delivery, client_satisfaction, team_feedback, growth
             FROM weight_config ORDER BY version DESC LIMIT 1",
        )?;
        let result = stmt
            .query_row([], |row| {
                Ok((
                    row.get::<_, i64>(0)? as u64,
                    WeightConfig {
                        delivery: row.get::<_, i64>(1)? as u32,
                        client_satisfaction: row.get::<_, i64>(2)? as u32,
                        team_feedback: row.get::<_, i64>(3)? as u32,
                        growth: row.get::<_, i64>(4)? as u32,
                    },
                ))
            })
            .ok();
        Ok(result)
    }

    /// Append a new weight version. Callers validate before writing.
    pub fn insert_weights(&self, weights: &WeightConfig) -> PulseResult<u64> {
        let next: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM weight_config",
            [],
            |row| row.get(0),
        )?;
        self.conn.execute(
            "INSERT INTO weight_config
             (version, delivery, client_satisfaction, team_feedback, growth, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                next,
                weights.delivery as i64,
                weights.client_satisfaction as i64,
                weights.team_feedback as i64,
                weights.growth as i64,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(next as u64)
    }

    pub fn weight_version_count(&self) -> PulseResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM weight_config", [], |row| row.get(0))
            .map_err(Into::into)
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> PulseResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (period, stage, event_type, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.period as i64,
                entry.stage,
                entry.event_type,
                entry.payload,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn events_for_period(&self, period: Period) -> PulseResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, period, stage, event_type, payload
             FROM event_log WHERE period = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![period as i64], |row| {
                Ok(EventLogEntry {
                    id: Some(row.get(0)?),
                    period: row.get::<_, i64>(1)? as u64,
                    stage: row.get(2)?,
                    event_type: row.get(3)?,
                    payload: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count_by_type(&self, event_type: &str) -> PulseResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM event_log WHERE event_type = ?1",
                params![event_type],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }
}

fn engineer_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<Engineer> {
    let level: String = row.get(2)?;
    Ok(Engineer {
        engineer_id: row.get(0)?,
        name: row.get(1)?,
        level: EngineerLevel::from_id(&level).ok_or_else(|| bad_enum(2, "level", &level))?,
        project: row.get(3)?,
        started_period: row.get::<_, i64>(4)? as u64,
    })
}

// ── Column conversion helpers shared by the submodules ───────────────

pub(crate) fn bad_enum(idx: usize, what: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("invalid {what}: {value}").into(),
    )
}

pub(crate) fn parse_timestamp(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

pub(crate) fn parse_date(idx: usize, value: String) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    idx: usize,
    value: String,
) -> rusqlite::Result<T> {
    serde_json::from_str(&value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}
