//! Inbound signal records — the engine's upstream boundary.
//!
//! The signal store itself is an external collaborator (integrations,
//! survey tooling, check-in forms). It delivers these records already
//! keyed by engineer, pillar/metric and period; the engine only ingests
//! and scores them. Every record carries a submission timestamp and a
//! source attribution.

use crate::types::{CheckinStatus, EntityId, Period, Pillar};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a signal came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    /// Synced from a delivery integration (VCS, tracker, CI).
    Integration,
    /// Entered by the engineer's lead.
    Lead,
    /// Client satisfaction survey response.
    Client,
    /// The engineer's own submission.
    SelfReport,
}

impl SignalSource {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Integration => "integration",
            Self::Lead => "lead",
            Self::Client => "client",
            Self::SelfReport => "self_report",
        }
    }

    pub fn from_id(id: &str) -> Option<SignalSource> {
        match id {
            "integration" => Some(Self::Integration),
            "lead" => Some(Self::Lead),
            "client" => Some(Self::Client),
            "self_report" => Some(Self::SelfReport),
            _ => None,
        }
    }
}

/// A raw per-period metric value for one engineer and pillar.
///
/// Score-type metrics carry values in the 0–100 domain and average into
/// the pillar score. Work-shape metrics (`work_item_count`,
/// `avg_item_complexity`) describe what Delivery work looked like and
/// feed pattern detection only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSignal {
    pub engineer_id: EntityId,
    pub pillar: Pillar,
    pub metric: String,
    pub value: f64,
    pub period: Period,
    pub submitted_at: DateTime<Utc>,
    pub source: SignalSource,
}

/// Metric name for the Delivery work-item count sub-metric.
pub const METRIC_WORK_ITEM_COUNT: &str = "work_item_count";
/// Metric name for the Delivery average item complexity sub-metric.
pub const METRIC_AVG_ITEM_COMPLEXITY: &str = "avg_item_complexity";

/// True for metrics that describe work shape rather than performance;
/// these never enter the pillar score mean.
pub fn is_work_shape_metric(metric: &str) -> bool {
    metric == METRIC_WORK_ITEM_COUNT || metric == METRIC_AVG_ITEM_COMPLEXITY
}

/// A lead's periodic check-in on an engineer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadCheckin {
    pub engineer_id: EntityId,
    pub period: Period,
    pub status: CheckinStatus,
    pub note: String,
    pub submitted_at: DateTime<Utc>,
}

/// The engineer's own periodic self-assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfAssessment {
    pub engineer_id: EntityId,
    pub period: Period,
    /// Self-rated trajectory, 0–100.
    pub rating: f64,
    pub submitted_at: DateTime<Utc>,
}

/// A roster member. Identity is immutable; level and project change only
/// through external reassignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engineer {
    pub engineer_id: EntityId,
    pub name: String,
    pub level: crate::types::EngineerLevel,
    pub project: String,
    pub started_period: Period,
}
