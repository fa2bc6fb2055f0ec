//! Alert persistence. Alerts are append-only; acknowledgment is the
//! single mutation and nothing is ever deleted.

use super::{bad_enum, parse_json, parse_timestamp, PulseStore};
use crate::{
    alert_subsystem::{AffectedMetric, Alert, PatternKind},
    error::{PulseError, PulseResult},
    types::Severity,
};
use rusqlite::params;

impl PulseStore {
    pub fn insert_alert(&self, a: &Alert) -> PulseResult<()> {
        let affected = serde_json::to_string(&a.affected_metrics)?;
        self.conn.execute(
            "INSERT INTO alert
             (alert_id, engineer_id, period, severity, pattern, fingerprint,
              trigger_description, affected_metrics, score_snapshot,
              acknowledged, context_action_id, triggered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                &a.alert_id,
                &a.engineer_id,
                a.period as i64,
                a.severity.id(),
                a.pattern.id(),
                &a.fingerprint,
                &a.trigger_description,
                affected,
                a.score_snapshot,
                if a.acknowledged { 1i32 } else { 0i32 },
                a.context_action_id.as_deref(),
                a.triggered_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_alert(&self, alert_id: &str) -> PulseResult<Option<Alert>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ALERT_COLUMNS} FROM alert WHERE alert_id = ?1"
        ))?;
        let result = stmt.query_row(params![alert_id], alert_row_mapper).ok();
        Ok(result)
    }

    /// An open (unacknowledged) alert matching the dedup fingerprint.
    pub fn open_alert_with_fingerprint(
        &self,
        engineer_id: &str,
        fingerprint: &str,
    ) -> PulseResult<Option<Alert>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ALERT_COLUMNS} FROM alert
             WHERE engineer_id = ?1 AND fingerprint = ?2 AND acknowledged = 0
             ORDER BY period DESC LIMIT 1"
        ))?;
        let result = stmt
            .query_row(params![engineer_id, fingerprint], alert_row_mapper)
            .ok();
        Ok(result)
    }

    pub fn alerts_for_engineer(&self, engineer_id: &str) -> PulseResult<Vec<Alert>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ALERT_COLUMNS} FROM alert
             WHERE engineer_id = ?1 ORDER BY period ASC, alert_id ASC"
        ))?;
        let rows = stmt.query_map(params![engineer_id], alert_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn open_alerts_for_engineer(&self, engineer_id: &str) -> PulseResult<Vec<Alert>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ALERT_COLUMNS} FROM alert
             WHERE engineer_id = ?1 AND acknowledged = 0
             ORDER BY period ASC, alert_id ASC"
        ))?;
        let rows = stmt.query_map(params![engineer_id], alert_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Acknowledge an alert. Errors if the alert does not exist.
    pub fn acknowledge_alert(&self, alert_id: &str) -> PulseResult<()> {
        let changed = self.conn.execute(
            "UPDATE alert SET acknowledged = 1 WHERE alert_id = ?1",
            params![alert_id],
        )?;
        if changed == 0 {
            return Err(PulseError::NotFound {
                kind: "alert",
                id: alert_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn alert_count(&self) -> PulseResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM alert", [], |row| row.get(0))
            .map_err(Into::into)
    }
}

const ALERT_COLUMNS: &str = "alert_id, engineer_id, period, severity, pattern, \
    fingerprint, trigger_description, affected_metrics, score_snapshot, \
    acknowledged, context_action_id, triggered_at";

fn alert_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<Alert> {
    let severity: String = row.get(3)?;
    let pattern: String = row.get(4)?;
    let affected: Vec<AffectedMetric> = parse_json(7, row.get(7)?)?;
    Ok(Alert {
        alert_id: row.get(0)?,
        engineer_id: row.get(1)?,
        period: row.get::<_, i64>(2)? as u64,
        severity: Severity::from_id(&severity)
            .ok_or_else(|| bad_enum(3, "severity", &severity))?,
        pattern: PatternKind::from_id(&pattern)
            .ok_or_else(|| bad_enum(4, "pattern", &pattern))?,
        fingerprint: row.get(5)?,
        trigger_description: row.get(6)?,
        affected_metrics: affected,
        score_snapshot: row.get(8)?,
        acknowledged: row.get::<_, i32>(9)? != 0,
        context_action_id: row.get(10)?,
        triggered_at: parse_timestamp(11, row.get(11)?)?,
    })
}
