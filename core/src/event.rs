//! Engine events — every state change the engine makes is announced
//! here and appended to the event_log table as JSON.
//!
//! RULE: variants are added over time — never removed or reordered.

use crate::types::{EntityId, Period, Pillar, Severity, Trend};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PulseEvent {
    // ── Scoring ────────────────────────────────────
    PillarScored {
        period: Period,
        engineer_id: EntityId,
        pillar: Pillar,
        score: f64,
        trend: Trend,
    },
    PillarIncomplete {
        period: Period,
        engineer_id: EntityId,
        pillar: Pillar,
    },
    CompositeScored {
        period: Period,
        engineer_id: EntityId,
        value: i64,
        partial: bool,
        trend: Trend,
        config_version: u64,
    },

    // ── Detection ──────────────────────────────────
    AlertRaised {
        period: Period,
        alert_id: EntityId,
        engineer_id: EntityId,
        pattern: String,
        severity: Severity,
    },
    AlertAcknowledged {
        period: Period,
        alert_id: EntityId,
    },

    // ── Actions ────────────────────────────────────
    ActionCreated {
        period: Period,
        action_id: EntityId,
        engineer_id: EntityId,
        alert_id: Option<EntityId>,
    },
    ActionStarted {
        period: Period,
        action_id: EntityId,
    },
    ActionCompleted {
        period: Period,
        action_id: EntityId,
    },

    // ── Effectiveness ──────────────────────────────
    EffectivenessEvaluated {
        period: Period,
        action_id: EntityId,
        verdict: String,
        effectiveness_score: f64,
    },
    EscalationRaised {
        period: Period,
        action_id: EntityId,
        alert_id: EntityId,
    },

    // ── Weights and recompute ──────────────────────
    WeightsUpdated {
        period: Period,
        version: u64,
        delivery: u32,
        client_satisfaction: u32,
        team_feedback: u32,
        growth: u32,
    },
    WeightsRejected {
        period: Period,
        reason: String,
    },
    RecomputeStarted {
        period: Period,
        scope: String,
    },
    RecomputeCompleted {
        period: Period,
        scope: String,
        engineers: usize,
        config_version: u64,
    },
    RecomputeCoalesced {
        period: Period,
        scope: String,
    },
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub period: Period,
    /// Pipeline stage or command that produced the event.
    pub stage: String,
    pub event_type: String,
    pub payload: String, // JSON-serialized PulseEvent
}

/// Extract a stable string name from a PulseEvent variant.
/// Used for the event_type column in event_log.
pub fn event_type_name(event: &PulseEvent) -> &'static str {
    match event {
        PulseEvent::PillarScored { .. } => "pillar_scored",
        PulseEvent::PillarIncomplete { .. } => "pillar_incomplete",
        PulseEvent::CompositeScored { .. } => "composite_scored",
        PulseEvent::AlertRaised { .. } => "alert_raised",
        PulseEvent::AlertAcknowledged { .. } => "alert_acknowledged",
        PulseEvent::ActionCreated { .. } => "action_created",
        PulseEvent::ActionStarted { .. } => "action_started",
        PulseEvent::ActionCompleted { .. } => "action_completed",
        PulseEvent::EffectivenessEvaluated { .. } => "effectiveness_evaluated",
        PulseEvent::EscalationRaised { .. } => "escalation_raised",
        PulseEvent::WeightsUpdated { .. } => "weights_updated",
        PulseEvent::WeightsRejected { .. } => "weights_rejected",
        PulseEvent::RecomputeStarted { .. } => "recompute_started",
        PulseEvent::RecomputeCompleted { .. } => "recompute_completed",
        PulseEvent::RecomputeCoalesced { .. } => "recompute_coalesced",
    }
}
