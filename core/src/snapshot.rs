//! Engineer period snapshot — the common input every alert rule reads.
//!
//! Assembled by the engine from store rows after scoring completes.
//! Rules see one engineer's full picture for the period and nothing
//! else; adding a rule never requires new plumbing through the
//! detection loop.

use crate::{
    composite_subsystem::CompositeScore,
    scoring_subsystem::PillarScore,
    signal::Engineer,
    types::{CheckinStatus, Period, Pillar, Trend},
};
use serde::{Deserialize, Serialize};

/// Delivery work-shape sub-metrics for the current and prior period.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorkShape {
    pub item_count: f64,
    pub prev_item_count: Option<f64>,
    pub avg_complexity: f64,
    pub prev_avg_complexity: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineerSnapshot {
    pub engineer: Engineer,
    pub period: Period,
    /// Pillars that scored this period (incomplete ones are absent).
    pub pillars: Vec<PillarScore>,
    pub composite: Option<CompositeScore>,
    pub work_shape: Option<WorkShape>,
    pub checkin: Option<CheckinStatus>,
    /// Whether any self-reported signal (self-assessment or
    /// self-sourced record) exists for the period.
    pub has_self_report: bool,
}

impl EngineerSnapshot {
    pub fn pillar(&self, pillar: Pillar) -> Option<&PillarScore> {
        self.pillars.iter().find(|p| p.pillar == pillar)
    }

    pub fn declining_pillars(&self) -> Vec<&PillarScore> {
        self.pillars
            .iter()
            .filter(|p| p.trend == Trend::Declining)
            .collect()
    }
}
