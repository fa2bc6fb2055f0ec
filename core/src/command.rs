//! Collaborator-issued write commands.
//!
//! Each variant is a discrete, auditable write: validation happens
//! before any state changes, and every accepted command lands in the
//! event log.

use crate::{action_subsystem::ActionStatus, types::Pillar};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum PulseCommand {
    AcknowledgeAlert {
        alert_id: String,
    },
    CreateAction {
        engineer_id: String,
        description: String,
        due_date: NaiveDate,
        #[serde(default)]
        pillar: Option<Pillar>,
        #[serde(default)]
        alert_id: Option<String>,
        created_by: String,
    },
    UpdateActionStatus {
        action_id: String,
        status: ActionStatus,
    },
    CompleteAction {
        action_id: String,
        resolution_note: String,
    },
    UpdateWeight {
        pillar: Pillar,
        weight: u32,
    },
    /// Replace the whole weight set atomically. Single-pillar updates
    /// can only rebalance against themselves; moving points between
    /// pillars goes through this.
    UpdateWeights {
        weights: crate::config::WeightConfig,
    },
    TriggerRecompute {
        scope: RecomputeScope,
    },
}

/// What a recompute covers. At most one recompute runs per scope at a
/// time; concurrent triggers for the same scope coalesce.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum RecomputeScope {
    All,
    Project { project: String },
}

impl RecomputeScope {
    /// Stable key for the in-flight set and log lines.
    pub fn key(&self) -> String {
        match self {
            Self::All => "all".to_string(),
            Self::Project { project } => format!("project:{project}"),
        }
    }
}
