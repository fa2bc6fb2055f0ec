//! Action item and effectiveness persistence.

use super::{bad_enum, parse_date, parse_json, parse_timestamp, PulseStore};
use crate::{
    action_subsystem::{ActionItem, ActionStatus},
    effectiveness_subsystem::{ActionEffectiveness, MetricDelta, Verdict},
    error::{PulseError, PulseResult},
    types::Pillar,
};
use rusqlite::params;

impl PulseStore {
    pub fn insert_action(&self, a: &ActionItem) -> PulseResult<()> {
        self.conn.execute(
            "INSERT INTO action_item
             (action_id, engineer_id, alert_id, description, status, due_date,
              pillar, created_by, created_at, created_period,
              resolved_at, resolved_period, resolution_note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                &a.action_id,
                &a.engineer_id,
                a.alert_id.as_deref(),
                &a.description,
                a.status.id(),
                a.due_date.to_string(),
                a.pillar.map(|p| p.id()),
                &a.created_by,
                a.created_at.to_rfc3339(),
                a.created_period as i64,
                a.resolved_at.map(|t| t.to_rfc3339()),
                a.resolved_period.map(|p| p as i64),
                a.resolution_note.as_deref(),
            ],
        )?;
        Ok(())
    }

    pub fn get_action(&self, action_id: &str) -> PulseResult<ActionItem> {
        self.conn
            .query_row(
                &format!("SELECT {ACTION_COLUMNS} FROM action_item WHERE action_id = ?1"),
                params![action_id],
                action_row_mapper,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => PulseError::NotFound {
                    kind: "action",
                    id: action_id.to_string(),
                },
                other => other.into(),
            })
    }

    pub fn set_action_status(&self, action_id: &str, status: ActionStatus) -> PulseResult<()> {
        self.conn.execute(
            "UPDATE action_item SET status = ?1 WHERE action_id = ?2",
            params![status.id(), action_id],
        )?;
        Ok(())
    }

    pub fn mark_action_completed(
        &self,
        action_id: &str,
        resolved_at: chrono::DateTime<chrono::Utc>,
        resolved_period: u64,
        resolution_note: &str,
    ) -> PulseResult<()> {
        self.conn.execute(
            "UPDATE action_item SET status = 'completed',
                resolved_at = ?1, resolved_period = ?2, resolution_note = ?3
             WHERE action_id = ?4",
            params![
                resolved_at.to_rfc3339(),
                resolved_period as i64,
                resolution_note,
                action_id,
            ],
        )?;
        Ok(())
    }

    pub fn actions_for_engineer(&self, engineer_id: &str) -> PulseResult<Vec<ActionItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ACTION_COLUMNS} FROM action_item
             WHERE engineer_id = ?1 ORDER BY created_at ASC"
        ))?;
        let rows = stmt.query_map(params![engineer_id], action_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Completed actions still awaiting their one-time evaluation.
    pub fn completed_actions_unevaluated(&self) -> PulseResult<Vec<ActionItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ACTION_COLUMNS} FROM action_item a
             WHERE a.status = 'completed'
               AND NOT EXISTS (
                   SELECT 1 FROM action_effectiveness e
                   WHERE e.action_id = a.action_id
               )
             ORDER BY a.resolved_period ASC, a.action_id ASC"
        ))?;
        let rows = stmt.query_map([], action_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Effectiveness ──────────────────────────────────────────

    pub fn insert_effectiveness(&self, e: &ActionEffectiveness) -> PulseResult<()> {
        let deltas = serde_json::to_string(&e.metric_deltas)?;
        self.conn.execute(
            "INSERT INTO action_effectiveness
             (action_id, evaluated_period, evaluated_at, verdict,
              effectiveness_score, metric_deltas)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &e.action_id,
                e.evaluated_period as i64,
                e.evaluated_at.to_rfc3339(),
                e.verdict.id(),
                e.effectiveness_score,
                deltas,
            ],
        )?;
        Ok(())
    }

    pub fn effectiveness_for(
        &self,
        action_id: &str,
    ) -> PulseResult<Option<ActionEffectiveness>> {
        let mut stmt = self.conn.prepare(
            "SELECT action_id, evaluated_period, evaluated_at, verdict,
                    effectiveness_score, metric_deltas
             FROM action_effectiveness WHERE action_id = ?1",
        )?;
        let result = stmt
            .query_row(params![action_id], |row| {
                let verdict: String = row.get(3)?;
                let deltas: Vec<MetricDelta> = parse_json(5, row.get(5)?)?;
                Ok(ActionEffectiveness {
                    action_id: row.get(0)?,
                    evaluated_period: row.get::<_, i64>(1)? as u64,
                    evaluated_at: parse_timestamp(2, row.get(2)?)?,
                    verdict: Verdict::from_id(&verdict)
                        .ok_or_else(|| bad_enum(3, "verdict", &verdict))?,
                    effectiveness_score: row.get(4)?,
                    metric_deltas: deltas,
                })
            })
            .ok();
        Ok(result)
    }

    pub fn effectiveness_count(&self) -> PulseResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM action_effectiveness", [], |row| {
                row.get(0)
            })
            .map_err(Into::into)
    }
}

const ACTION_COLUMNS: &str = "action_id, engineer_id, alert_id, description, status, \
    due_date, pillar, created_by, created_at, created_period, \
    resolved_at, resolved_period, resolution_note";

fn action_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActionItem> {
    let status: String = row.get(4)?;
    let pillar: Option<String> = row.get(6)?;
    let resolved_at: Option<String> = row.get(10)?;
    Ok(ActionItem {
        action_id: row.get(0)?,
        engineer_id: row.get(1)?,
        alert_id: row.get(2)?,
        description: row.get(3)?,
        status: ActionStatus::from_id(&status)
            .ok_or_else(|| bad_enum(4, "action status", &status))?,
        due_date: parse_date(5, row.get(5)?)?,
        pillar: match pillar {
            Some(p) => {
                Some(Pillar::from_id(&p).ok_or_else(|| bad_enum(6, "pillar", &p))?)
            }
            None => None,
        },
        created_by: row.get(7)?,
        created_at: parse_timestamp(8, row.get(8)?)?,
        created_period: row.get::<_, i64>(9)? as u64,
        resolved_at: match resolved_at {
            Some(t) => Some(parse_timestamp(10, t)?),
            None => None,
        },
        resolved_period: row.get::<_, Option<i64>>(11)?.map(|p| p as u64),
        resolution_note: row.get(12)?,
    })
}
