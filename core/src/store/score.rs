//! Pillar and composite score persistence. Recomputation upserts so a
//! superseding run overwrites stale rows instead of merging with them.

use super::{bad_enum, parse_json, PulseStore};
use crate::{
    composite_subsystem::CompositeScore,
    error::PulseResult,
    scoring_subsystem::PillarScore,
    types::{Period, Pillar, SparkPoint, Trend},
};
use rusqlite::params;

impl PulseStore {
    pub fn upsert_pillar_score(
        &self,
        engineer_id: &str,
        period: Period,
        score: &PillarScore,
    ) -> PulseResult<()> {
        let sparkline = serde_json::to_string(&score.sparkline)?;
        self.conn.execute(
            "INSERT INTO pillar_score
             (engineer_id, period, pillar, weight, score, trend, sparkline, config_version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(engineer_id, period, pillar) DO UPDATE SET
                weight = excluded.weight,
                score = excluded.score,
                trend = excluded.trend,
                sparkline = excluded.sparkline,
                config_version = excluded.config_version",
            params![
                engineer_id,
                period as i64,
                score.pillar.id(),
                score.weight as i64,
                score.score,
                score.trend.id(),
                sparkline,
                score.config_version as i64,
            ],
        )?;
        Ok(())
    }

    pub fn pillar_score(
        &self,
        engineer_id: &str,
        period: Period,
        pillar: Pillar,
    ) -> PulseResult<Option<PillarScore>> {
        let mut stmt = self.conn.prepare(
            "SELECT pillar, weight, score, trend, sparkline, config_version
             FROM pillar_score
             WHERE engineer_id = ?1 AND period = ?2 AND pillar = ?3",
        )?;
        let result = stmt
            .query_row(
                params![engineer_id, period as i64, pillar.id()],
                pillar_score_row_mapper,
            )
            .ok();
        Ok(result)
    }

    /// All pillars that scored for the period, in stable pillar order.
    pub fn pillar_scores_for(
        &self,
        engineer_id: &str,
        period: Period,
    ) -> PulseResult<Vec<PillarScore>> {
        let mut stmt = self.conn.prepare(
            "SELECT pillar, weight, score, trend, sparkline, config_version
             FROM pillar_score
             WHERE engineer_id = ?1 AND period = ?2
             ORDER BY pillar ASC",
        )?;
        let rows = stmt.query_map(
            params![engineer_id, period as i64],
            pillar_score_row_mapper,
        )?;
        let mut scores: Vec<PillarScore> = rows.collect::<Result<Vec<_>, _>>()?;
        // Stable domain order beats lexicographic column order.
        scores.sort_by_key(|s| Pillar::ALL.iter().position(|p| *p == s.pillar));
        Ok(scores)
    }

    /// The most recent score before `period`, for sparkline
    /// continuity across periods a pillar sat out.
    pub fn latest_pillar_score_before(
        &self,
        engineer_id: &str,
        pillar: Pillar,
        period: Period,
    ) -> PulseResult<Option<PillarScore>> {
        let mut stmt = self.conn.prepare(
            "SELECT pillar, weight, score, trend, sparkline, config_version
             FROM pillar_score
             WHERE engineer_id = ?1 AND pillar = ?2 AND period < ?3
             ORDER BY period DESC LIMIT 1",
        )?;
        let result = stmt
            .query_row(
                params![engineer_id, pillar.id(), period as i64],
                pillar_score_row_mapper,
            )
            .ok();
        Ok(result)
    }

    pub fn upsert_composite(&self, score: &CompositeScore) -> PulseResult<()> {
        let sparkline = serde_json::to_string(&score.sparkline)?;
        self.conn.execute(
            "INSERT INTO composite_score
             (engineer_id, period, value, partial, trend, sparkline, config_version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(engineer_id, period) DO UPDATE SET
                value = excluded.value,
                partial = excluded.partial,
                trend = excluded.trend,
                sparkline = excluded.sparkline,
                config_version = excluded.config_version",
            params![
                &score.engineer_id,
                score.period as i64,
                score.value,
                if score.partial { 1i32 } else { 0i32 },
                score.trend.id(),
                sparkline,
                score.config_version as i64,
            ],
        )?;
        Ok(())
    }

    pub fn composite(
        &self,
        engineer_id: &str,
        period: Period,
    ) -> PulseResult<Option<CompositeScore>> {
        let mut stmt = self.conn.prepare(
            "SELECT engineer_id, period, value, partial, trend, sparkline, config_version
             FROM composite_score
             WHERE engineer_id = ?1 AND period = ?2",
        )?;
        let result = stmt
            .query_row(params![engineer_id, period as i64], composite_row_mapper)
            .ok();
        Ok(result)
    }

    pub fn latest_composite_before(
        &self,
        engineer_id: &str,
        period: Period,
    ) -> PulseResult<Option<CompositeScore>> {
        let mut stmt = self.conn.prepare(
            "SELECT engineer_id, period, value, partial, trend, sparkline, config_version
             FROM composite_score
             WHERE engineer_id = ?1 AND period < ?2
             ORDER BY period DESC LIMIT 1",
        )?;
        let result = stmt
            .query_row(params![engineer_id, period as i64], composite_row_mapper)
            .ok();
        Ok(result)
    }

    pub fn composite_count(&self, period: Period) -> PulseResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM composite_score WHERE period = ?1",
                params![period as i64],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }
}

fn pillar_score_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<PillarScore> {
    let pillar: String = row.get(0)?;
    let trend: String = row.get(3)?;
    let sparkline: Vec<SparkPoint> = parse_json(4, row.get(4)?)?;
    Ok(PillarScore {
        pillar: Pillar::from_id(&pillar).ok_or_else(|| bad_enum(0, "pillar", &pillar))?,
        weight: row.get::<_, i64>(1)? as u32,
        score: row.get(2)?,
        trend: Trend::from_id(&trend).ok_or_else(|| bad_enum(3, "trend", &trend))?,
        sparkline,
        config_version: row.get::<_, i64>(5)? as u64,
    })
}

fn composite_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<CompositeScore> {
    let trend: String = row.get(4)?;
    let sparkline: Vec<SparkPoint> = parse_json(5, row.get(5)?)?;
    Ok(CompositeScore {
        engineer_id: row.get(0)?,
        period: row.get::<_, i64>(1)? as u64,
        value: row.get(2)?,
        partial: row.get::<_, i32>(3)? != 0,
        trend: Trend::from_id(&trend).ok_or_else(|| bad_enum(4, "trend", &trend))?,
        sparkline,
        config_version: row.get::<_, i64>(6)? as u64,
    })
}
