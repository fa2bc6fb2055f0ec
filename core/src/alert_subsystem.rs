//! Behavioral alert detection — third stage of the period pipeline.
//!
//! The five patterns are a rule table, not a hard-coded cascade: each
//! rule is a named predicate over the engineer's period snapshot, and
//! the detection loop walks the registry in fixed precedence order.
//! Adding a pattern means adding a rule impl and a registry entry.
//!
//! RULE: detection is idempotent. An alert's fingerprint is its pattern
//! plus the sorted affected-metric names; while an unacknowledged alert
//! with the same engineer + fingerprint is open, re-detection of the
//! identical situation is suppressed, not duplicated.

use crate::{
    config::DetectorConfig,
    error::PulseResult,
    snapshot::EngineerSnapshot,
    store::PulseStore,
    types::{EntityId, Period, Pillar, Severity, SparkPoint, Trend},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    SingleMetric,
    SlowdownSpiral,
    ComplexityAvoidance,
    SilentStruggle,
    BlockedAndDeclining,
}

impl PatternKind {
    pub fn id(&self) -> &'static str {
        match self {
            Self::SingleMetric => "single_metric",
            Self::SlowdownSpiral => "slowdown_spiral",
            Self::ComplexityAvoidance => "complexity_avoidance",
            Self::SilentStruggle => "silent_struggle",
            Self::BlockedAndDeclining => "blocked_and_declining",
        }
    }

    pub fn from_id(id: &str) -> Option<PatternKind> {
        match id {
            "single_metric" => Some(Self::SingleMetric),
            "slowdown_spiral" => Some(Self::SlowdownSpiral),
            "complexity_avoidance" => Some(Self::ComplexityAvoidance),
            "silent_struggle" => Some(Self::SilentStruggle),
            "blocked_and_declining" => Some(Self::BlockedAndDeclining),
            _ => None,
        }
    }
}

/// A metric cited by an alert, with the evidence at trigger time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffectedMetric {
    pub name: String,
    pub current_value: f64,
    pub threshold: f64,
    pub trend: Trend,
    pub sparkline: Vec<SparkPoint>,
}

impl AffectedMetric {
    fn from_pillar(score: &crate::scoring_subsystem::PillarScore, threshold: f64) -> Self {
        Self {
            name: score.pillar.id().to_string(),
            current_value: score.score,
            threshold,
            trend: score.trend,
            sparkline: score.sparkline.clone(),
        }
    }

    /// Breach depth relative to the threshold; zero when healthy.
    pub fn breach_depth(&self) -> f64 {
        if self.threshold <= 0.0 {
            return 0.0;
        }
        ((self.threshold - self.current_value) / self.threshold).max(0.0)
    }
}

/// What a rule proposes before persistence and dedup.
#[derive(Debug, Clone)]
pub struct AlertDraft {
    pub pattern: PatternKind,
    pub severity: Severity,
    pub trigger_description: String,
    pub affected_metrics: Vec<AffectedMetric>,
}

/// A persisted behavioral alert. Never deleted; acknowledged is the
/// only field that mutates, via the acknowledge command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: EntityId,
    pub engineer_id: EntityId,
    pub period: Period,
    pub severity: Severity,
    pub pattern: PatternKind,
    pub fingerprint: String,
    pub trigger_description: String,
    pub affected_metrics: Vec<AffectedMetric>,
    /// Composite value at trigger time, when one existed.
    pub score_snapshot: Option<i64>,
    pub acknowledged: bool,
    /// Set on escalation alerts: the completed action whose follow-up
    /// evaluation raised this alert.
    pub context_action_id: Option<EntityId>,
    pub triggered_at: DateTime<Utc>,
}

impl Alert {
    /// The affected metric with the deepest breach.
    pub fn dominant_metric(&self) -> Option<&AffectedMetric> {
        self.affected_metrics.iter().max_by(|a, b| {
            a.breach_depth()
                .partial_cmp(&b.breach_depth())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }

    /// Pillar suggested for a follow-up action: the dominant affected
    /// metric, when it names a pillar.
    pub fn dominant_pillar(&self) -> Option<Pillar> {
        self.dominant_metric().and_then(|m| Pillar::from_id(&m.name))
    }
}

/// Stable dedup key: pattern + sorted affected-metric names.
pub fn fingerprint(pattern: PatternKind, metrics: &[AffectedMetric]) -> String {
    let mut names: Vec<&str> = metrics.iter().map(|m| m.name.as_str()).collect();
    names.sort_unstable();
    format!("{}:{}", pattern.id(), names.join("+"))
}

// ── Rule registry ────────────────────────────────────────────────────

/// The contract every alert pattern fulfills.
pub trait AlertRule {
    /// Stable pattern this rule detects.
    fn kind(&self) -> PatternKind;

    /// Evaluate the snapshot; Some(draft) when the pattern fires.
    fn evaluate(
        &self,
        snapshot: &EngineerSnapshot,
        config: &DetectorConfig,
    ) -> Option<AlertDraft>;
}

/// The built-in rules in fixed precedence order.
/// Order matters only for event ordering; rules fire independently.
pub fn rule_registry() -> Vec<Box<dyn AlertRule>> {
    vec![
        Box::new(SingleMetricRule),
        Box::new(SlowdownSpiralRule),
        Box::new(ComplexityAvoidanceRule),
        Box::new(SilentStruggleRule),
        Box::new(BlockedAndDecliningRule),
    ]
}

// ── single-metric ────────────────────────────────────────────────────

/// Exactly one pillar breaches its threshold while the rest are
/// healthy. Mild breaches (within the configured margin of the
/// threshold) monitor; deeper breaches demand attention.
struct SingleMetricRule;

impl AlertRule for SingleMetricRule {
    fn kind(&self) -> PatternKind {
        PatternKind::SingleMetric
    }

    fn evaluate(
        &self,
        snapshot: &EngineerSnapshot,
        config: &DetectorConfig,
    ) -> Option<AlertDraft> {
        // Partial composites mean missing pillar data; a lone breach
        // among what remains is not trustworthy evidence.
        if snapshot.composite.as_ref().is_none_or(|c| c.partial) {
            return None;
        }

        let breached: Vec<_> = snapshot
            .pillars
            .iter()
            .filter(|p| p.score < config.threshold_for(p.pillar))
            .collect();
        if breached.len() != 1 {
            return None;
        }

        let pillar = breached[0];
        let threshold = config.threshold_for(pillar.pillar);
        let mild_floor = threshold * (1.0 - config.mild_breach_margin);
        let severity = if pillar.score >= mild_floor {
            Severity::Monitor
        } else {
            Severity::Attention
        };

        Some(AlertDraft {
            pattern: PatternKind::SingleMetric,
            severity,
            trigger_description: format!(
                "{} at {:.0}, below its {:.0} threshold while other pillars hold",
                pillar.pillar.label(),
                pillar.score,
                threshold,
            ),
            affected_metrics: vec![AffectedMetric::from_pillar(pillar, threshold)],
        })
    }
}

// ── slowdown-spiral ──────────────────────────────────────────────────

/// Delivery sparkline strictly declining across the configured number
/// of consecutive periods.
struct SlowdownSpiralRule;

/// Length in periods of the strictly-decreasing run ending at the
/// newest point.
fn declining_run_len(sparkline: &[SparkPoint]) -> usize {
    if sparkline.is_empty() {
        return 0;
    }
    let mut run = 1;
    for pair in sparkline.windows(2).rev() {
        if pair[1].value < pair[0].value {
            run += 1;
        } else {
            break;
        }
    }
    run
}

impl AlertRule for SlowdownSpiralRule {
    fn kind(&self) -> PatternKind {
        PatternKind::SlowdownSpiral
    }

    fn evaluate(
        &self,
        snapshot: &EngineerSnapshot,
        config: &DetectorConfig,
    ) -> Option<AlertDraft> {
        let delivery = snapshot.pillar(Pillar::Delivery)?;
        let run = declining_run_len(&delivery.sparkline);
        if run < config.spiral_window {
            return None;
        }

        let threshold = config.threshold_for(Pillar::Delivery);
        Some(AlertDraft {
            pattern: PatternKind::SlowdownSpiral,
            severity: Severity::Attention,
            trigger_description: format!(
                "Delivery has declined {run} consecutive periods ({:.0} \u{2192} {:.0})",
                delivery.sparkline.first().map(|p| p.value).unwrap_or(0.0),
                delivery.score,
            ),
            affected_metrics: vec![AffectedMetric::from_pillar(delivery, threshold)],
        })
    }
}

// ── complexity-avoidance ─────────────────────────────────────────────

/// Growth flat-or-declining while Delivery work shifts toward more,
/// smaller items: item count rising, average complexity falling.
struct ComplexityAvoidanceRule;

fn growth_is_flat(sparkline: &[SparkPoint], flat_periods: usize, epsilon: f64) -> bool {
    if sparkline.len() < flat_periods + 1 {
        return false;
    }
    sparkline
        .windows(2)
        .rev()
        .take(flat_periods)
        .all(|pair| pair[1].value - pair[0].value < epsilon)
}

impl AlertRule for ComplexityAvoidanceRule {
    fn kind(&self) -> PatternKind {
        PatternKind::ComplexityAvoidance
    }

    fn evaluate(
        &self,
        snapshot: &EngineerSnapshot,
        config: &DetectorConfig,
    ) -> Option<AlertDraft> {
        let growth = snapshot.pillar(Pillar::Growth)?;
        if !growth_is_flat(
            &growth.sparkline,
            config.growth_flat_periods,
            config.growth_flat_epsilon,
        ) {
            return None;
        }

        let shape = snapshot.work_shape?;
        let (prev_count, prev_complexity) =
            (shape.prev_item_count?, shape.prev_avg_complexity?);
        if prev_count <= 0.0 || prev_complexity <= 0.0 {
            return None;
        }

        let count_rise = (shape.item_count - prev_count) / prev_count;
        let complexity_drop = (prev_complexity - shape.avg_complexity) / prev_complexity;
        if count_rise < config.complexity_count_rise
            || complexity_drop < config.complexity_size_drop
        {
            return None;
        }

        let growth_threshold = config.threshold_for(Pillar::Growth);
        Some(AlertDraft {
            pattern: PatternKind::ComplexityAvoidance,
            severity: Severity::Monitor,
            trigger_description: format!(
                "Growth flat while work shifted smaller: {:.0} items (was {:.0}), \
                 avg complexity {:.1} (was {:.1})",
                shape.item_count, prev_count, shape.avg_complexity, prev_complexity,
            ),
            affected_metrics: vec![
                AffectedMetric::from_pillar(growth, growth_threshold),
                AffectedMetric {
                    name: crate::signal::METRIC_WORK_ITEM_COUNT.to_string(),
                    current_value: shape.item_count,
                    threshold: prev_count,
                    trend: Trend::Improving,
                    sparkline: vec![
                        SparkPoint { period: snapshot.period.saturating_sub(1), value: prev_count },
                        SparkPoint { period: snapshot.period, value: shape.item_count },
                    ],
                },
                AffectedMetric {
                    name: crate::signal::METRIC_AVG_ITEM_COMPLEXITY.to_string(),
                    current_value: shape.avg_complexity,
                    threshold: prev_complexity,
                    trend: Trend::Declining,
                    sparkline: vec![
                        SparkPoint {
                            period: snapshot.period.saturating_sub(1),
                            value: prev_complexity,
                        },
                        SparkPoint { period: snapshot.period, value: shape.avg_complexity },
                    ],
                },
            ],
        })
    }
}

// ── silent-struggle ──────────────────────────────────────────────────

/// A declining pillar with no self-reported signal for the period.
/// Absence of voice compounds a negative trend.
struct SilentStruggleRule;

impl AlertRule for SilentStruggleRule {
    fn kind(&self) -> PatternKind {
        PatternKind::SilentStruggle
    }

    fn evaluate(
        &self,
        snapshot: &EngineerSnapshot,
        config: &DetectorConfig,
    ) -> Option<AlertDraft> {
        if snapshot.has_self_report {
            return None;
        }
        let declining = snapshot.declining_pillars();
        if declining.is_empty() {
            return None;
        }

        let names: Vec<&str> = declining.iter().map(|p| p.pillar.label()).collect();
        Some(AlertDraft {
            pattern: PatternKind::SilentStruggle,
            severity: Severity::Attention,
            trigger_description: format!(
                "{} declining with no self-reported signal this period",
                names.join(", "),
            ),
            affected_metrics: declining
                .iter()
                .map(|p| AffectedMetric::from_pillar(p, config.threshold_for(p.pillar)))
                .collect(),
        })
    }
}

// ── blocked-and-declining ────────────────────────────────────────────

/// Lead check-in reports Blocked while two or more pillars decline.
struct BlockedAndDecliningRule;

impl AlertRule for BlockedAndDecliningRule {
    fn kind(&self) -> PatternKind {
        PatternKind::BlockedAndDeclining
    }

    fn evaluate(
        &self,
        snapshot: &EngineerSnapshot,
        config: &DetectorConfig,
    ) -> Option<AlertDraft> {
        if snapshot.checkin != Some(crate::types::CheckinStatus::Blocked) {
            return None;
        }
        let declining = snapshot.declining_pillars();
        if declining.len() < 2 {
            return None;
        }

        Some(AlertDraft {
            pattern: PatternKind::BlockedAndDeclining,
            severity: Severity::Attention,
            trigger_description: format!(
                "Check-in reports blocked with {} pillars declining",
                declining.len(),
            ),
            affected_metrics: declining
                .iter()
                .map(|p| AffectedMetric::from_pillar(p, config.threshold_for(p.pillar)))
                .collect(),
        })
    }
}

// ── Detector ─────────────────────────────────────────────────────────

/// Outcome of one engineer's detection pass.
#[derive(Debug, Default)]
pub struct DetectionOutcome {
    pub raised: Vec<Alert>,
    /// Drafts suppressed because an identical pattern+metric-set alert
    /// is still open and unacknowledged.
    pub suppressed: usize,
}

pub struct AlertDetector {
    config: DetectorConfig,
    rules: Vec<Box<dyn AlertRule>>,
}

impl AlertDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            rules: rule_registry(),
        }
    }

    /// Run every rule over the snapshot, persisting new alerts and
    /// suppressing duplicates. Multiple patterns may co-fire; each
    /// firing pattern yields at most one alert.
    pub fn detect(
        &self,
        store: &PulseStore,
        snapshot: &EngineerSnapshot,
    ) -> PulseResult<DetectionOutcome> {
        let mut outcome = DetectionOutcome::default();

        for rule in &self.rules {
            let Some(draft) = rule.evaluate(snapshot, &self.config) else {
                continue;
            };
            debug_assert_eq!(draft.pattern, rule.kind());

            let fp = fingerprint(draft.pattern, &draft.affected_metrics);
            if store
                .open_alert_with_fingerprint(&snapshot.engineer.engineer_id, &fp)?
                .is_some()
            {
                log::debug!(
                    "period={} detector: {} suppressed for {} (open alert {fp})",
                    snapshot.period,
                    draft.pattern.id(),
                    snapshot.engineer.engineer_id,
                );
                outcome.suppressed += 1;
                continue;
            }

            let alert = Alert {
                alert_id: format!(
                    "al-{}-{}-{}",
                    snapshot.period,
                    snapshot.engineer.engineer_id,
                    draft.pattern.id(),
                ),
                engineer_id: snapshot.engineer.engineer_id.clone(),
                period: snapshot.period,
                severity: draft.severity,
                pattern: draft.pattern,
                fingerprint: fp,
                trigger_description: draft.trigger_description,
                affected_metrics: draft.affected_metrics,
                score_snapshot: snapshot.composite.as_ref().map(|c| c.value),
                acknowledged: false,
                context_action_id: None,
                triggered_at: Utc::now(),
            };
            store.insert_alert(&alert)?;

            log::info!(
                "period={} alert: {} {} for {} — {}",
                snapshot.period,
                alert.severity.id(),
                alert.pattern.id(),
                alert.engineer_id,
                alert.trigger_description,
            );
            outcome.raised.push(alert);
        }

        Ok(outcome)
    }
}
