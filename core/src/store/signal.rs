//! Inbound signal queries: raw signals, check-ins, self-assessments.

use super::{bad_enum, parse_timestamp, PulseStore};
use crate::{
    error::PulseResult,
    signal::{LeadCheckin, RawSignal, SelfAssessment, SignalSource},
    types::{CheckinStatus, Period, Pillar},
};
use rusqlite::params;

impl PulseStore {
    pub fn insert_signal(&self, s: &RawSignal) -> PulseResult<()> {
        self.conn.execute(
            "INSERT INTO raw_signal
             (engineer_id, pillar, metric, value, period, submitted_at, source)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &s.engineer_id,
                s.pillar.id(),
                &s.metric,
                s.value,
                s.period as i64,
                s.submitted_at.to_rfc3339(),
                s.source.id(),
            ],
        )?;
        Ok(())
    }

    pub fn signals_for(
        &self,
        engineer_id: &str,
        pillar: Pillar,
        period: Period,
    ) -> PulseResult<Vec<RawSignal>> {
        let mut stmt = self.conn.prepare(
            "SELECT engineer_id, pillar, metric, value, period, submitted_at, source
             FROM raw_signal
             WHERE engineer_id = ?1 AND pillar = ?2 AND period = ?3
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(
            params![engineer_id, pillar.id(), period as i64],
            signal_row_mapper,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// One named metric's value for the period, if submitted.
    /// The latest submission wins when integrations re-sync.
    pub fn signal_value(
        &self,
        engineer_id: &str,
        pillar: Pillar,
        period: Period,
        metric: &str,
    ) -> PulseResult<Option<f64>> {
        let mut stmt = self.conn.prepare(
            "SELECT value FROM raw_signal
             WHERE engineer_id = ?1 AND pillar = ?2 AND period = ?3 AND metric = ?4
             ORDER BY id DESC LIMIT 1",
        )?;
        let result = stmt
            .query_row(
                params![engineer_id, pillar.id(), period as i64, metric],
                |row| row.get(0),
            )
            .ok();
        Ok(result)
    }

    pub fn insert_checkin(&self, c: &LeadCheckin) -> PulseResult<()> {
        self.conn.execute(
            "INSERT INTO lead_checkin (engineer_id, period, status, note, submitted_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(engineer_id, period) DO UPDATE SET
                status = excluded.status,
                note = excluded.note,
                submitted_at = excluded.submitted_at",
            params![
                &c.engineer_id,
                c.period as i64,
                c.status.id(),
                &c.note,
                c.submitted_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn checkin_for(
        &self,
        engineer_id: &str,
        period: Period,
    ) -> PulseResult<Option<LeadCheckin>> {
        let mut stmt = self.conn.prepare(
            "SELECT engineer_id, period, status, note, submitted_at
             FROM lead_checkin WHERE engineer_id = ?1 AND period = ?2",
        )?;
        let result = stmt
            .query_row(params![engineer_id, period as i64], |row| {
                let status: String = row.get(2)?;
                Ok(LeadCheckin {
                    engineer_id: row.get(0)?,
                    period: row.get::<_, i64>(1)? as u64,
                    status: CheckinStatus::from_id(&status)
                        .ok_or_else(|| bad_enum(2, "checkin status", &status))?,
                    note: row.get(3)?,
                    submitted_at: parse_timestamp(4, row.get(4)?)?,
                })
            })
            .ok();
        Ok(result)
    }

    pub fn insert_self_assessment(&self, a: &SelfAssessment) -> PulseResult<()> {
        self.conn.execute(
            "INSERT INTO self_assessment (engineer_id, period, rating, submitted_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(engineer_id, period) DO UPDATE SET
                rating = excluded.rating,
                submitted_at = excluded.submitted_at",
            params![
                &a.engineer_id,
                a.period as i64,
                a.rating,
                a.submitted_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Any self-reported voice for the period: a self-assessment or a
    /// raw signal attributed to the engineer themselves.
    pub fn has_self_report(&self, engineer_id: &str, period: Period) -> PulseResult<bool> {
        let assessments: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM self_assessment
             WHERE engineer_id = ?1 AND period = ?2",
            params![engineer_id, period as i64],
            |row| row.get(0),
        )?;
        if assessments > 0 {
            return Ok(true);
        }
        let self_signals: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM raw_signal
             WHERE engineer_id = ?1 AND period = ?2 AND source = ?3",
            params![engineer_id, period as i64, SignalSource::SelfReport.id()],
            |row| row.get(0),
        )?;
        Ok(self_signals > 0)
    }
}

fn signal_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSignal> {
    let pillar: String = row.get(1)?;
    let source: String = row.get(6)?;
    Ok(RawSignal {
        engineer_id: row.get(0)?,
        pillar: Pillar::from_id(&pillar).ok_or_else(|| bad_enum(1, "pillar", &pillar))?,
        metric: row.get(2)?,
        value: row.get(3)?,
        period: row.get::<_, i64>(4)? as u64,
        submitted_at: parse_timestamp(5, row.get(5)?)?,
        source: SignalSource::from_id(&source)
            .ok_or_else(|| bad_enum(6, "signal source", &source))?,
    })
}
