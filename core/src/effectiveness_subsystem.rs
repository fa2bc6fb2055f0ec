//! Post-action effectiveness evaluation — closes the loop.
//!
//! Runs once per completed action, no earlier than the first period
//! after completion. Compares the metrics the originating alert cited
//! (or the standalone action's declared pillar) before and after, and
//! produces a verdict. An `escalated` verdict raises exactly one new
//! alert carrying the prior action for context, feeding detection again.

use crate::{
    action_subsystem::ActionItem,
    alert_subsystem::{fingerprint, AffectedMetric, Alert, PatternKind},
    config::{DetectorConfig, EffectivenessConfig},
    error::{PulseError, PulseResult},
    store::PulseStore,
    types::{EntityId, Period, Pillar, Severity, Trend},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Resolved,
    Monitoring,
    Escalated,
}

impl Verdict {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Resolved => "resolved",
            Self::Monitoring => "monitoring",
            Self::Escalated => "escalated",
        }
    }

    pub fn from_id(id: &str) -> Option<Verdict> {
        match id {
            "resolved" => Some(Self::Resolved),
            "monitoring" => Some(Self::Monitoring),
            "escalated" => Some(Self::Escalated),
            _ => None,
        }
    }
}

/// One tracked metric's before/after movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricDelta {
    pub metric: String,
    pub value_at_alert: f64,
    pub value_now: f64,
    pub delta_percent: f64,
    pub trend: Trend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEffectiveness {
    pub action_id: EntityId,
    pub evaluated_period: Period,
    pub evaluated_at: DateTime<Utc>,
    pub verdict: Verdict,
    /// Display-only 0–100 aggregate of per-metric recovery.
    pub effectiveness_score: f64,
    pub metric_deltas: Vec<MetricDelta>,
}

/// Typed outcome: early requests defer, they never fail.
#[derive(Debug)]
pub enum EvaluationOutcome {
    /// No post-completion period exists yet, or the baseline is
    /// missing. Ask again next period.
    NotYetEvaluable,
    /// Evaluation already recorded for this action.
    AlreadyEvaluated,
    Evaluated {
        effectiveness: ActionEffectiveness,
        /// Present when the verdict escalated.
        escalation: Option<Alert>,
    },
}

/// A metric tracked through an evaluation: where it stood at alert
/// time and the healthy threshold it must return inside.
struct TrackedMetric {
    name: String,
    pillar: Pillar,
    value_at_alert: f64,
    threshold: f64,
}

pub struct EffectivenessEvaluator {
    config: EffectivenessConfig,
    detector: DetectorConfig,
}

impl EffectivenessEvaluator {
    pub fn new(config: EffectivenessConfig, detector: DetectorConfig) -> Self {
        Self { config, detector }
    }

    /// Evaluate a completed action as of `period`.
    pub fn evaluate(
        &self,
        store: &PulseStore,
        action: &ActionItem,
        period: Period,
    ) -> PulseResult<EvaluationOutcome> {
        let Some(resolved_period) = action.resolved_period else {
            return Err(PulseError::validation(format!(
                "action '{}' is not completed",
                action.action_id
            )));
        };
        if store.effectiveness_for(&action.action_id)?.is_some() {
            return Ok(EvaluationOutcome::AlreadyEvaluated);
        }
        // Minimum one post-completion period of metrics.
        if period <= resolved_period {
            return Ok(EvaluationOutcome::NotYetEvaluable);
        }

        let tracked = self.tracked_metrics(store, action)?;
        if tracked.is_empty() {
            // Nothing to measure (no originating alert, no declared
            // pillar). Still record the one evaluation the action gets.
            let effectiveness = ActionEffectiveness {
                action_id: action.action_id.clone(),
                evaluated_period: period,
                evaluated_at: Utc::now(),
                verdict: Verdict::Monitoring,
                effectiveness_score: 0.0,
                metric_deltas: Vec::new(),
            };
            store.insert_effectiveness(&effectiveness)?;
            return Ok(EvaluationOutcome::Evaluated {
                effectiveness,
                escalation: None,
            });
        }

        let mut deltas = Vec::with_capacity(tracked.len());
        let mut all_healthy = true;
        let mut any_now = false;
        for metric in &tracked {
            let Some(now) = store
                .pillar_score(&action.engineer_id, period, metric.pillar)?
                .map(|s| s.score)
            else {
                continue;
            };
            any_now = true;
            if now < metric.threshold {
                all_healthy = false;
            }
            deltas.push(MetricDelta {
                metric: metric.name.clone(),
                value_at_alert: metric.value_at_alert,
                value_now: now,
                delta_percent: delta_percent(metric.value_at_alert, now),
                trend: if now > metric.value_at_alert {
                    Trend::Improving
                } else if now < metric.value_at_alert {
                    Trend::Declining
                } else {
                    Trend::Stable
                },
            });
        }
        if !any_now {
            // The post-completion period has no scores for the tracked
            // pillars yet; defer rather than judge on nothing.
            return Ok(EvaluationOutcome::NotYetEvaluable);
        }

        let within_window =
            period - resolved_period <= self.config.healthy_within_periods;
        let dominant = dominant_delta(&tracked, &deltas);
        let dominant_declined = match (&dominant, self.value_at_completion(store, action, &tracked)?) {
            (Some(d), Some(at_completion)) => d.value_now < at_completion,
            _ => false,
        };

        let verdict = if all_healthy && within_window {
            Verdict::Resolved
        } else if dominant_declined {
            Verdict::Escalated
        } else {
            Verdict::Monitoring
        };

        let effectiveness = ActionEffectiveness {
            action_id: action.action_id.clone(),
            evaluated_period: period,
            evaluated_at: Utc::now(),
            verdict,
            effectiveness_score: effectiveness_score(&tracked, &deltas),
            metric_deltas: deltas,
        };
        store.insert_effectiveness(&effectiveness)?;

        let escalation = if verdict == Verdict::Escalated {
            Some(self.raise_escalation(store, action, &tracked, &effectiveness, period)?)
        } else {
            None
        };

        log::info!(
            "period={period} effectiveness: action {} verdict={} score={:.0}",
            action.action_id,
            verdict.id(),
            effectiveness.effectiveness_score,
        );

        Ok(EvaluationOutcome::Evaluated {
            effectiveness,
            escalation,
        })
    }

    /// Metrics to track: the originating alert's affected pillars, or
    /// the standalone action's declared pillar with its score at
    /// creation as the baseline.
    fn tracked_metrics(
        &self,
        store: &PulseStore,
        action: &ActionItem,
    ) -> PulseResult<Vec<TrackedMetric>> {
        if let Some(alert_id) = &action.alert_id {
            let alert = store.get_alert(alert_id)?.ok_or(PulseError::NotFound {
                kind: "alert",
                id: alert_id.clone(),
            })?;
            return Ok(alert
                .affected_metrics
                .iter()
                .filter_map(|m| {
                    Pillar::from_id(&m.name).map(|pillar| TrackedMetric {
                        name: m.name.clone(),
                        pillar,
                        value_at_alert: m.current_value,
                        threshold: m.threshold,
                    })
                })
                .collect());
        }

        let Some(pillar) = action.pillar else {
            return Ok(Vec::new());
        };
        let baseline = store.pillar_score(
            &action.engineer_id,
            action.created_period,
            pillar,
        )?;
        Ok(baseline
            .map(|s| {
                vec![TrackedMetric {
                    name: pillar.id().to_string(),
                    pillar,
                    value_at_alert: s.score,
                    threshold: self.detector.threshold_for(pillar),
                }]
            })
            .unwrap_or_default())
    }

    /// Score of the dominant tracked pillar at the completion period.
    fn value_at_completion(
        &self,
        store: &PulseStore,
        action: &ActionItem,
        tracked: &[TrackedMetric],
    ) -> PulseResult<Option<f64>> {
        let Some(resolved_period) = action.resolved_period else {
            return Ok(None);
        };
        let Some(dominant) = dominant_tracked(tracked) else {
            return Ok(None);
        };
        Ok(store
            .pillar_score(&action.engineer_id, resolved_period, dominant.pillar)?
            .map(|s| s.score))
    }

    fn raise_escalation(
        &self,
        store: &PulseStore,
        action: &ActionItem,
        tracked: &[TrackedMetric],
        effectiveness: &ActionEffectiveness,
        period: Period,
    ) -> PulseResult<Alert> {
        let (pattern, metrics) = match &action.alert_id {
            Some(alert_id) => {
                let prior = store.get_alert(alert_id)?.ok_or(PulseError::NotFound {
                    kind: "alert",
                    id: alert_id.clone(),
                })?;
                (prior.pattern, prior.affected_metrics)
            }
            // Standalone actions escalate on their declared pillar.
            None => (
                PatternKind::SingleMetric,
                tracked
                    .iter()
                    .map(|t| AffectedMetric {
                        name: t.name.clone(),
                        current_value: t.value_at_alert,
                        threshold: t.threshold,
                        trend: Trend::Declining,
                        sparkline: Vec::new(),
                    })
                    .collect(),
            ),
        };

        // Cite current values, not the stale trigger-time evidence.
        let affected_metrics: Vec<AffectedMetric> = metrics
            .into_iter()
            .map(|mut m| {
                if let Some(delta) = effectiveness
                    .metric_deltas
                    .iter()
                    .find(|d| d.metric == m.name)
                {
                    m.current_value = delta.value_now;
                    m.trend = delta.trend;
                }
                m
            })
            .collect();

        let alert = Alert {
            alert_id: format!("al-{period}-{}-esc-{}", action.engineer_id, action.action_id),
            engineer_id: action.engineer_id.clone(),
            period,
            severity: Severity::Attention,
            pattern,
            fingerprint: fingerprint(pattern, &affected_metrics),
            trigger_description: format!(
                "Metrics kept declining after action '{}' completed",
                action.description,
            ),
            affected_metrics,
            score_snapshot: store
                .composite(&action.engineer_id, period)?
                .map(|c| c.value),
            acknowledged: false,
            context_action_id: Some(action.action_id.clone()),
            triggered_at: Utc::now(),
        };
        store.insert_alert(&alert)?;

        log::warn!(
            "period={period} effectiveness: escalated action {} — new alert {}",
            action.action_id,
            alert.alert_id,
        );
        Ok(alert)
    }
}

fn delta_percent(at_alert: f64, now: f64) -> f64 {
    if at_alert == 0.0 {
        return 0.0;
    }
    (now - at_alert) / at_alert * 100.0
}

/// Deepest breach at alert time decides which metric dominates.
fn dominant_tracked(tracked: &[TrackedMetric]) -> Option<&TrackedMetric> {
    tracked.iter().max_by(|a, b| {
        let depth_a = (a.threshold - a.value_at_alert).max(0.0);
        let depth_b = (b.threshold - b.value_at_alert).max(0.0);
        depth_a
            .partial_cmp(&depth_b)
            .unwrap_or(std::cmp::Ordering::Equal)
    })
}

fn dominant_delta<'a>(
    tracked: &[TrackedMetric],
    deltas: &'a [MetricDelta],
) -> Option<&'a MetricDelta> {
    let dominant = dominant_tracked(tracked)?;
    deltas.iter().find(|d| d.metric == dominant.name)
}

/// Mean per-metric normalized recovery, clamped to 0–100. A metric that
/// was healthy at alert time contributes full credit.
fn effectiveness_score(tracked: &[TrackedMetric], deltas: &[MetricDelta]) -> f64 {
    if deltas.is_empty() {
        return 0.0;
    }
    let mut total = 0.0;
    for delta in deltas {
        let Some(metric) = tracked.iter().find(|t| t.name == delta.metric) else {
            continue;
        };
        let gap = metric.threshold - metric.value_at_alert;
        let recovery = if gap <= 0.0 {
            100.0
        } else {
            ((delta.value_now - metric.value_at_alert) / gap * 100.0).clamp(0.0, 100.0)
        };
        total += recovery;
    }
    total / deltas.len() as f64
}
