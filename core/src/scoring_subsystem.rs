//! Pillar scoring — first stage of the period pipeline.
//!
//! Turns one engineer's raw signals for one pillar and period into a
//! 0–100 score, a fixed-length sparkline window and a trend
//! classification.
//!
//! RULE: a pillar with no signals for the period carries NO score.
//! It is reported as incomplete, never defaulted to zero and never
//! carried forward from the prior period.

use crate::{
    config::{TrendConfig, WeightConfig},
    signal::{is_work_shape_metric, RawSignal},
    types::{Period, Pillar, SparkPoint, Trend},
};
use serde::{Deserialize, Serialize};

/// One pillar's score for one engineer and period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PillarScore {
    pub pillar: Pillar,
    /// Weight in percentage points under `config_version`.
    pub weight: u32,
    pub score: f64,
    pub trend: Trend,
    /// Oldest → newest, at most the configured window length.
    pub sparkline: Vec<SparkPoint>,
    /// Weight-config version this score was computed under.
    pub config_version: u64,
}

/// Mean of the period's score-type metric values, clamped to 0–100.
/// Work-shape metrics never enter the mean. Returns None when the
/// period has no score-type signals (pillar incomplete).
pub fn score_signals(signals: &[RawSignal]) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for signal in signals {
        if is_work_shape_metric(&signal.metric) {
            continue;
        }
        sum += signal.value.clamp(0.0, 100.0);
        count += 1;
    }
    if count == 0 {
        return None;
    }
    Some(sum / count as f64)
}

/// Append the current period to a sparkline window, evicting the oldest
/// point once the window exceeds its fixed length (FIFO).
pub fn push_window(
    mut window: Vec<SparkPoint>,
    period: Period,
    value: f64,
    window_len: usize,
) -> Vec<SparkPoint> {
    window.push(SparkPoint { period, value });
    while window.len() > window_len {
        window.remove(0);
    }
    window
}

/// Oldest-vs-newest trend classification. Deterministic: the same
/// sparkline always yields the same trend.
pub fn classify_trend(sparkline: &[SparkPoint], trend: &TrendConfig) -> Trend {
    let (Some(oldest), Some(newest)) = (sparkline.first(), sparkline.last()) else {
        return Trend::Stable;
    };
    let delta = newest.value - oldest.value;
    if delta >= trend.epsilon {
        Trend::Improving
    } else if delta <= -trend.epsilon {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

/// Compute a pillar's score for the period, extending the prior
/// period's sparkline. `prior_window` is the sparkline stored on the
/// previous period's score (empty for a first period).
pub fn compute_pillar_score(
    pillar: Pillar,
    period: Period,
    signals: &[RawSignal],
    prior_window: Vec<SparkPoint>,
    weights: &WeightConfig,
    config_version: u64,
    trend: &TrendConfig,
    window_len: usize,
) -> Option<PillarScore> {
    let score = score_signals(signals)?;
    let sparkline = push_window(prior_window, period, score, window_len);
    let trend = classify_trend(&sparkline, trend);
    Some(PillarScore {
        pillar,
        weight: weights.weight_for(pillar),
        score,
        trend,
        sparkline,
        config_version,
    })
}
