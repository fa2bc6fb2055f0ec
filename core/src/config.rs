//! Engine configuration.
//!
//! All thresholds the scoring and detection rules depend on live here,
//! not as constants in the rule code: epsilon for trend classification,
//! the mild-breach margin, pattern window lengths and per-pillar health
//! thresholds are product-calibrated values and ship as config.

use crate::{
    error::{PulseError, PulseResult},
    types::Pillar,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-pillar composite weights, in percentage points.
///
/// INVARIANT: the four weights sum to exactly 100. Enforced by
/// `validate()` at every write, never at read time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeightConfig {
    pub delivery: u32,
    pub client_satisfaction: u32,
    pub team_feedback: u32,
    pub growth: u32,
}

impl WeightConfig {
    pub fn weight_for(&self, pillar: Pillar) -> u32 {
        match pillar {
            Pillar::Delivery => self.delivery,
            Pillar::ClientSatisfaction => self.client_satisfaction,
            Pillar::TeamFeedback => self.team_feedback,
            Pillar::Growth => self.growth,
        }
    }

    pub fn with_weight(mut self, pillar: Pillar, weight: u32) -> Self {
        match pillar {
            Pillar::Delivery => self.delivery = weight,
            Pillar::ClientSatisfaction => self.client_satisfaction = weight,
            Pillar::TeamFeedback => self.team_feedback = weight,
            Pillar::Growth => self.growth = weight,
        }
        self
    }

    pub fn total(&self) -> u32 {
        self.delivery + self.client_satisfaction + self.team_feedback + self.growth
    }

    /// Reject any set that does not sum to exactly 100 points.
    /// The message is surfaced verbatim to callers.
    pub fn validate(&self) -> PulseResult<()> {
        let total = self.total();
        if total != 100 {
            return Err(PulseError::config(format!(
                "pillar weights sum to {total}%, must equal 100%"
            )));
        }
        Ok(())
    }
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            delivery: 40,
            client_satisfaction: 20,
            team_feedback: 20,
            growth: 20,
        }
    }
}

/// Trend classification parameters (§ sparkline oldest-vs-newest rule).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrendConfig {
    /// Minimum newest-minus-oldest movement (in score points) before a
    /// sparkline counts as improving/declining rather than stable.
    pub epsilon: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self { epsilon: 2.0 }
    }
}

/// Alert pattern detection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Health threshold per pillar id. A pillar score below its
    /// threshold counts as a breach.
    pub pillar_thresholds: HashMap<String, f64>,
    /// A breach within this fraction of the threshold is "mild"
    /// (monitor); deeper breaches are severe (attention).
    pub mild_breach_margin: f64,
    /// Consecutive strictly-declining Delivery periods before the
    /// slowdown-spiral pattern fires.
    pub spiral_window: usize,
    /// Periods of flat-or-declining Growth before complexity-avoidance
    /// becomes eligible.
    pub growth_flat_periods: usize,
    /// A period-over-period Growth gain below this still counts as
    /// flat. Mirrors the trend epsilon.
    pub growth_flat_epsilon: f64,
    /// Minimum fractional rise in work item count for the
    /// complexity-avoidance shift signal.
    pub complexity_count_rise: f64,
    /// Minimum fractional drop in average item complexity for the
    /// complexity-avoidance shift signal.
    pub complexity_size_drop: f64,
}

impl DetectorConfig {
    pub fn threshold_for(&self, pillar: Pillar) -> f64 {
        self.pillar_thresholds
            .get(pillar.id())
            .copied()
            .unwrap_or(60.0)
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            pillar_thresholds: Pillar::ALL
                .iter()
                .map(|p| (p.id().to_string(), 60.0))
                .collect(),
            mild_breach_margin: 0.10,
            spiral_window: 3,
            growth_flat_periods: 2,
            growth_flat_epsilon: 2.0,
            complexity_count_rise: 0.15,
            complexity_size_drop: 0.15,
        }
    }
}

/// Post-action effectiveness evaluation parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EffectivenessConfig {
    /// Tracked metrics must be back inside their threshold within this
    /// many periods of completion for a `resolved` verdict.
    pub healthy_within_periods: u64,
}

impl Default for EffectivenessConfig {
    fn default() -> Self {
        Self {
            healthy_within_periods: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct WeightsFile {
    weights: WeightConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct DetectorFile {
    #[serde(default)]
    trend: TrendConfig,
    detector: DetectorConfig,
    #[serde(default)]
    effectiveness: EffectivenessConfig,
    #[serde(default = "default_sparkline_window")]
    sparkline_window: usize,
}

fn default_sparkline_window() -> usize {
    6
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Initial weight set. Once the store is migrated this seeds
    /// weight-config version 1; later versions come from updates.
    pub weights: WeightConfig,
    pub trend: TrendConfig,
    pub detector: DetectorConfig,
    pub effectiveness: EffectivenessConfig,
    /// Fixed sparkline window length (FIFO eviction).
    pub sparkline_window: usize,
}

impl EngineConfig {
    /// Load from the data/ directory.
    /// In tests, use EngineConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let weights_path = format!("{data_dir}/weights.json");
        let weights_content = std::fs::read_to_string(&weights_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {weights_path}: {e}"))?;
        let weights_file: WeightsFile = serde_json::from_str(&weights_content)?;
        weights_file
            .weights
            .validate()
            .map_err(|e| anyhow::anyhow!("{weights_path}: {e}"))?;

        let detector_path = format!("{data_dir}/detector.json");
        let detector_content = std::fs::read_to_string(&detector_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {detector_path}: {e}"))?;
        let detector_file: DetectorFile = serde_json::from_str(&detector_content)?;

        Ok(Self {
            weights: weights_file.weights,
            trend: detector_file.trend,
            detector: detector_file.detector,
            effectiveness: detector_file.effectiveness,
            sparkline_window: detector_file.sparkline_window,
        })
    }

    /// Deterministic defaults used by the test suite.
    pub fn default_test() -> Self {
        Self {
            weights: WeightConfig::default(),
            trend: TrendConfig::default(),
            detector: DetectorConfig::default(),
            effectiveness: EffectivenessConfig::default(),
            sparkline_window: 6,
        }
    }
}
