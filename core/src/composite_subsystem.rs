//! Composite scoring — second stage of the period pipeline.
//!
//! Combines the period's pillar scores into a single weighted value.
//! Weights are validated when written (config.rs); this stage trusts
//! the active version and never revalidates.
//!
//! RULE: incomplete pillars redistribute their weight proportionally
//! across the pillars that are present, so a composite is always
//! computable from whatever data exists. Such composites are flagged
//! partial so downstream detection can lower confidence.

use crate::{
    config::TrendConfig,
    scoring_subsystem::{classify_trend, push_window, PillarScore},
    types::{EntityId, Period, SparkPoint, Trend},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeScore {
    pub engineer_id: EntityId,
    pub period: Period,
    /// Weighted sum rounded to the nearest integer.
    pub value: i64,
    /// True when one or more pillars were incomplete this period.
    pub partial: bool,
    pub trend: Trend,
    pub sparkline: Vec<SparkPoint>,
    pub config_version: u64,
}

/// Weighted composite over the present pillars.
///
/// With all four pillars present this is exactly
/// round(Σ score_i × weight_i / 100). With pillars missing, dividing by
/// the sum of present weights is the proportional redistribution of the
/// missing weight. Returns None when no pillar scored at all.
pub fn weighted_value(pillars: &[PillarScore]) -> Option<(i64, bool)> {
    if pillars.is_empty() {
        return None;
    }
    let present_weight: u32 = pillars.iter().map(|p| p.weight).sum();
    if present_weight == 0 {
        return None;
    }
    let weighted: f64 = pillars
        .iter()
        .map(|p| p.score * p.weight as f64)
        .sum::<f64>()
        / present_weight as f64;
    let partial = pillars.len() < crate::types::Pillar::ALL.len();
    Some((weighted.round() as i64, partial))
}

/// Compute the composite for a period, extending the prior sparkline.
pub fn compute_composite(
    engineer_id: &str,
    period: Period,
    pillars: &[PillarScore],
    prior_window: Vec<SparkPoint>,
    config_version: u64,
    trend: &TrendConfig,
    window_len: usize,
) -> Option<CompositeScore> {
    let (value, partial) = weighted_value(pillars)?;
    let sparkline = push_window(prior_window, period, value as f64, window_len);
    let trend = classify_trend(&sparkline, trend);
    Some(CompositeScore {
        engineer_id: engineer_id.to_string(),
        period,
        value,
        partial,
        trend,
        sparkline,
        config_version,
    })
}
