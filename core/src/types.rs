//! Shared primitive types used across the entire engine.

use serde::{Deserialize, Serialize};

/// A scoring period. One period = one review cycle (e.g. a month).
/// Periods are monotonically increasing and never reused.
pub type Period = u64;

/// A stable, unique identifier for any entity in the engine.
pub type EntityId = String;

/// The four signal categories composing an engineer's pulse score.
/// Ids are stable across periods so sparklines and deltas line up.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Pillar {
    Delivery,
    ClientSatisfaction,
    TeamFeedback,
    Growth,
}

impl Pillar {
    pub const ALL: [Pillar; 4] = [
        Pillar::Delivery,
        Pillar::ClientSatisfaction,
        Pillar::TeamFeedback,
        Pillar::Growth,
    ];

    /// Stable id string, used as the database key.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Delivery => "delivery",
            Self::ClientSatisfaction => "client_satisfaction",
            Self::TeamFeedback => "team_feedback",
            Self::Growth => "growth",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Delivery => "Delivery",
            Self::ClientSatisfaction => "Client Satisfaction",
            Self::TeamFeedback => "Team Feedback",
            Self::Growth => "Growth",
        }
    }

    pub fn from_id(id: &str) -> Option<Pillar> {
        Pillar::ALL.into_iter().find(|p| p.id() == id)
    }
}

/// Trend classification over a sparkline window.
/// Ordinal order (declining < stable < improving) is relied on for
/// portfolio sorting. Do not reorder variants.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Declining,
    Stable,
    Improving,
}

impl Trend {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Declining => "declining",
            Self::Stable => "stable",
            Self::Improving => "improving",
        }
    }

    pub fn from_id(id: &str) -> Option<Trend> {
        match id {
            "declining" => Some(Self::Declining),
            "stable" => Some(Self::Stable),
            "improving" => Some(Self::Improving),
            _ => None,
        }
    }
}

/// Alert severity. Attention outranks monitor.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Monitor,
    Attention,
}

impl Severity {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Monitor => "monitor",
            Self::Attention => "attention",
        }
    }

    pub fn from_id(id: &str) -> Option<Severity> {
        match id {
            "monitor" => Some(Self::Monitor),
            "attention" => Some(Self::Attention),
            _ => None,
        }
    }
}

/// Roster-level rollup derived from an engineer's most severe
/// unacknowledged alert.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum AttentionStatus {
    Healthy,
    Monitor,
    Attention,
}

impl AttentionStatus {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Monitor => "monitor",
            Self::Attention => "attention",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EngineerLevel {
    Junior,
    Mid,
    Senior,
    Staff,
}

impl EngineerLevel {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Junior => "junior",
            Self::Mid => "mid",
            Self::Senior => "senior",
            Self::Staff => "staff",
        }
    }

    pub fn from_id(id: &str) -> Option<EngineerLevel> {
        match id {
            "junior" => Some(Self::Junior),
            "mid" => Some(Self::Mid),
            "senior" => Some(Self::Senior),
            "staff" => Some(Self::Staff),
            _ => None,
        }
    }
}

/// Lead check-in status for a period.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckinStatus {
    OnTrack,
    NeedsSupport,
    Blocked,
}

impl CheckinStatus {
    pub fn id(&self) -> &'static str {
        match self {
            Self::OnTrack => "on_track",
            Self::NeedsSupport => "needs_support",
            Self::Blocked => "blocked",
        }
    }

    pub fn from_id(id: &str) -> Option<CheckinStatus> {
        match id {
            "on_track" => Some(Self::OnTrack),
            "needs_support" => Some(Self::NeedsSupport),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }
}

/// One point of a sparkline: the value a pillar or composite carried
/// in a given period. Windows are ordered oldest → newest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SparkPoint {
    pub period: Period,
    pub value: f64,
}
