//! Action item lifecycle — remediation tracking.
//!
//! State machine: open → in-progress → completed, with open → completed
//! allowed as a direct jump. Completed is terminal; no transition leaves
//! it. Completion requires a non-empty resolution note and stamps
//! resolved_at/resolved_period, which gates effectiveness evaluation.
//!
//! Overdue is a read-time computation over due_date and status; it is
//! never stored.

use crate::{
    error::{PulseError, PulseResult},
    types::{EntityId, Period, Pillar},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Open,
    InProgress,
    Completed,
}

impl ActionStatus {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn from_id(id: &str) -> Option<ActionStatus> {
        match id {
            "open" => Some(Self::Open),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Transitions are one-directional; nothing returns from completed.
pub fn transition_allowed(from: ActionStatus, to: ActionStatus) -> bool {
    matches!(
        (from, to),
        (ActionStatus::Open, ActionStatus::InProgress)
            | (ActionStatus::Open, ActionStatus::Completed)
            | (ActionStatus::InProgress, ActionStatus::Completed)
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionItem {
    pub action_id: EntityId,
    pub engineer_id: EntityId,
    /// None for standalone (manager-initiated) items.
    pub alert_id: Option<EntityId>,
    pub description: String,
    pub status: ActionStatus,
    pub due_date: NaiveDate,
    pub pillar: Option<Pillar>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub created_period: Period,
    /// Set only on completion.
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_period: Option<Period>,
    pub resolution_note: Option<String>,
}

impl ActionItem {
    /// Overdue right now? Pure read-time check.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.due_date < today && self.status != ActionStatus::Completed
    }
}

/// Validated input for action creation.
#[derive(Debug, Clone)]
pub struct NewAction {
    pub engineer_id: EntityId,
    pub description: String,
    pub due_date: NaiveDate,
    pub pillar: Option<Pillar>,
    pub alert_id: Option<EntityId>,
    pub created_by: String,
}

impl NewAction {
    /// Reject before any state changes; the message surfaces verbatim.
    pub fn validate(&self) -> PulseResult<()> {
        if self.description.trim().is_empty() {
            return Err(PulseError::validation(
                "action description must not be empty",
            ));
        }
        if self.engineer_id.trim().is_empty() {
            return Err(PulseError::validation("action requires an engineer"));
        }
        Ok(())
    }
}

/// Guard a status change. Completion goes through `complete`, which
/// carries the resolution note this path cannot.
pub fn apply_transition(item: &ActionItem, to: ActionStatus) -> PulseResult<()> {
    if to == ActionStatus::Completed {
        return Err(PulseError::validation(
            "completion requires a resolution note; use the complete command",
        ));
    }
    if !transition_allowed(item.status, to) {
        return Err(PulseError::InvalidTransition {
            action_id: item.action_id.clone(),
            from: item.status.id().to_string(),
            to: to.id().to_string(),
        });
    }
    Ok(())
}

/// Guard completion: valid transition plus a non-empty note.
pub fn apply_completion(item: &ActionItem, resolution_note: &str) -> PulseResult<()> {
    if resolution_note.trim().is_empty() {
        return Err(PulseError::validation(
            "completion requires a non-empty resolution note",
        ));
    }
    if !transition_allowed(item.status, ActionStatus::Completed) {
        return Err(PulseError::InvalidTransition {
            action_id: item.action_id.clone(),
            from: item.status.id().to_string(),
            to: ActionStatus::Completed.id().to_string(),
        });
    }
    Ok(())
}
