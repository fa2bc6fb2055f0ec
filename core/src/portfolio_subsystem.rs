//! Portfolio rollup — the pure read/query layer over one period.
//!
//! No writes happen here: the roster projection combines composite and
//! pillar scores with an attention rollup from open alerts, then
//! filters, sorts and groups. All mutation lives upstream.

use crate::{
    alert_subsystem::Alert,
    composite_subsystem::CompositeScore,
    scoring_subsystem::PillarScore,
    signal::Engineer,
    types::{AttentionStatus, EngineerLevel, Severity, Trend},
};
use serde::{Deserialize, Serialize};

/// Read-only roster row for one engineer in one period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEngineer {
    pub engineer: Engineer,
    pub composite: Option<CompositeScore>,
    pub pillars: Vec<PillarScore>,
    pub attention_status: AttentionStatus,
}

impl RosterEngineer {
    pub fn trend(&self) -> Option<Trend> {
        self.composite.as_ref().map(|c| c.trend)
    }
}

/// Most severe unacknowledged alert decides the rollup.
pub fn attention_status(open_alerts: &[Alert]) -> AttentionStatus {
    let mut status = AttentionStatus::Healthy;
    for alert in open_alerts {
        if alert.acknowledged {
            continue;
        }
        status = status.max(match alert.severity {
            Severity::Attention => AttentionStatus::Attention,
            Severity::Monitor => AttentionStatus::Monitor,
        });
    }
    status
}

/// Roster filters. All fields are conjunctive; None means "any".
#[derive(Debug, Clone, Default)]
pub struct PortfolioFilter {
    pub project: Option<String>,
    pub level: Option<EngineerLevel>,
    pub trend: Option<Trend>,
    pub attention: Option<AttentionStatus>,
    /// Case-insensitive substring over the engineer's name.
    pub search: Option<String>,
}

impl PortfolioFilter {
    fn matches(&self, row: &RosterEngineer) -> bool {
        if let Some(project) = &self.project {
            if &row.engineer.project != project {
                return false;
            }
        }
        if let Some(level) = self.level {
            if row.engineer.level != level {
                return false;
            }
        }
        if let Some(trend) = self.trend {
            if row.trend() != Some(trend) {
                return false;
            }
        }
        if let Some(attention) = self.attention {
            if row.attention_status != attention {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            if !row.engineer.name.to_lowercase().contains(&needle) {
                return false;
            }
        }
        true
    }
}

pub fn filter_roster(
    roster: Vec<RosterEngineer>,
    filter: &PortfolioFilter,
) -> Vec<RosterEngineer> {
    roster.into_iter().filter(|r| filter.matches(r)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortfolioSort {
    Name,
    Project,
    Composite,
    /// declining < stable < improving, the fixed trend ordinal.
    Trend,
}

pub fn sort_roster(roster: &mut [RosterEngineer], sort: PortfolioSort, descending: bool) {
    roster.sort_by(|a, b| {
        let ordering = match sort {
            PortfolioSort::Name => a.engineer.name.cmp(&b.engineer.name),
            PortfolioSort::Project => a
                .engineer
                .project
                .cmp(&b.engineer.project)
                .then_with(|| a.engineer.name.cmp(&b.engineer.name)),
            PortfolioSort::Composite => {
                let va = a.composite.as_ref().map(|c| c.value).unwrap_or(i64::MIN);
                let vb = b.composite.as_ref().map(|c| c.value).unwrap_or(i64::MIN);
                va.cmp(&vb).then_with(|| a.engineer.name.cmp(&b.engineer.name))
            }
            PortfolioSort::Trend => a
                .trend()
                .cmp(&b.trend())
                .then_with(|| a.engineer.name.cmp(&b.engineer.name)),
        };
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

/// Grouped bucket view by overall trend. Rows without a composite go
/// to `unscored`.
#[derive(Debug, Clone, Default)]
pub struct TrendBuckets {
    pub improving: Vec<RosterEngineer>,
    pub stable: Vec<RosterEngineer>,
    pub declining: Vec<RosterEngineer>,
    pub unscored: Vec<RosterEngineer>,
}

pub fn group_by_trend(roster: Vec<RosterEngineer>) -> TrendBuckets {
    let mut buckets = TrendBuckets::default();
    for row in roster {
        match row.trend() {
            Some(Trend::Improving) => buckets.improving.push(row),
            Some(Trend::Stable) => buckets.stable.push(row),
            Some(Trend::Declining) => buckets.declining.push(row),
            None => buckets.unscored.push(row),
        }
    }
    buckets
}
