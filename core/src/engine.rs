//! The pulse engine — batch pipeline and command surface.
//!
//! EXECUTION ORDER per period, per engineer (fixed, documented,
//! never reordered):
//!   1. Pillar scoring        (scoring_subsystem)
//!   2. Composite aggregation (composite_subsystem)
//!   3. Alert detection       (alert_subsystem)
//! then, once per period:
//!   4. Effectiveness evaluation for completed actions.
//!
//! RULES:
//!   - Each engineer's computation reads only that engineer's history
//!     plus the shared, read-only weight config for the period.
//!   - Weight writes are serialized and versioned; every score records
//!     the version it was computed under.
//!   - At most one recompute runs per scope; concurrent triggers
//!     coalesce. A version change observed mid-run repeats the run:
//!     stale rows are overwritten by upserts, never merged.
//!   - All state changes are recorded in the event log.

use crate::{
    action_subsystem::{
        apply_completion, apply_transition, ActionItem, ActionStatus, NewAction,
    },
    alert_subsystem::AlertDetector,
    clock::PeriodClock,
    command::{PulseCommand, RecomputeScope},
    composite_subsystem::compute_composite,
    config::{EngineConfig, WeightConfig},
    effectiveness_subsystem::{EffectivenessEvaluator, EvaluationOutcome},
    error::{PulseError, PulseResult},
    event::{event_type_name, EventLogEntry, PulseEvent},
    portfolio_subsystem::{attention_status, RosterEngineer},
    scoring_subsystem::compute_pillar_score,
    signal::{Engineer, METRIC_AVG_ITEM_COMPLEXITY, METRIC_WORK_ITEM_COUNT},
    snapshot::{EngineerSnapshot, WorkShape},
    store::PulseStore,
    types::{Period, Pillar},
};
use std::collections::HashSet;
use std::sync::Mutex;
use uuid::Uuid;

/// Tracks in-flight recompute scopes. begin() claims a scope and
/// returns false when it is already claimed; end() releases it.
pub struct RecomputeGuard {
    in_flight: Mutex<HashSet<String>>,
}

impl RecomputeGuard {
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn begin(&self, key: &str) -> bool {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        set.insert(key.to_string())
    }

    pub fn end(&self, key: &str) {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(key);
    }
}

impl Default for RecomputeGuard {
    fn default() -> Self {
        Self::new()
    }
}

pub struct PulseEngine {
    pub store: PulseStore,
    pub config: EngineConfig,
    pub clock: PeriodClock,
    pub recompute: RecomputeGuard,
    detector: AlertDetector,
    evaluator: EffectivenessEvaluator,
}

impl PulseEngine {
    /// Build a fully wired engine over a migrated store. Seeds the
    /// first weight-config version from `config` when none exists.
    pub fn build(store: PulseStore, config: EngineConfig) -> PulseResult<Self> {
        if store.current_weights()?.is_none() {
            config.weights.validate()?;
            store.insert_weights(&config.weights)?;
        }
        let detector = AlertDetector::new(config.detector.clone());
        let evaluator =
            EffectivenessEvaluator::new(config.effectiveness, config.detector.clone());
        Ok(Self {
            store,
            config,
            clock: PeriodClock::new(),
            recompute: RecomputeGuard::new(),
            detector,
            evaluator,
        })
    }

    /// In-memory engine with deterministic defaults (tests).
    pub fn build_test() -> PulseResult<Self> {
        let store = PulseStore::in_memory()?;
        store.migrate()?;
        Self::build(store, EngineConfig::default_test())
    }

    pub fn current_period(&self) -> Period {
        self.clock.current_period
    }

    /// Open the next period. Signals for it are ingested afterwards,
    /// then `score_period` closes the books.
    pub fn advance_period(&mut self) -> Period {
        self.clock.advance()
    }

    // ── Period pipeline ────────────────────────────────────────

    /// Score one period end to end: every engineer's pillars,
    /// composite and alerts, then effectiveness for due actions.
    pub fn score_period(&mut self, period: Period) -> PulseResult<Vec<PulseEvent>> {
        self.clock.current_period = period;
        let mut events = self.run_scoped(period, &RecomputeScope::All)?;
        events.extend(self.evaluate_due_actions(period)?);
        self.append_events(period, &events)?;
        Ok(events)
    }

    /// Run scoring + detection for every engineer in scope, under one
    /// weight-config version. Repeats if the version moved mid-run, so
    /// the returned events always describe a consistent pass.
    fn run_scoped(
        &self,
        period: Period,
        scope: &RecomputeScope,
    ) -> PulseResult<Vec<PulseEvent>> {
        let engineers = match scope {
            RecomputeScope::All => self.store.list_engineers()?,
            RecomputeScope::Project { project } => {
                self.store.engineers_in_project(project)?
            }
        };

        loop {
            let (version, weights) =
                self.store
                    .current_weights()?
                    .ok_or_else(|| PulseError::config("no weight configuration written"))?;

            let mut events = Vec::new();
            for engineer in &engineers {
                events.extend(self.score_engineer(engineer, period, version, &weights)?);
            }

            match self.store.current_weights()? {
                Some((v, _)) if v == version => return Ok(events),
                _ => {
                    log::warn!(
                        "period={period} recompute: weights changed mid-run \
                         (was v{version}), repeating pass"
                    );
                }
            }
        }
    }

    fn score_engineer(
        &self,
        engineer: &Engineer,
        period: Period,
        version: u64,
        weights: &WeightConfig,
    ) -> PulseResult<Vec<PulseEvent>> {
        let mut events = Vec::new();

        // 1. Pillars.
        let mut pillars = Vec::new();
        for pillar in Pillar::ALL {
            let signals = self.store.signals_for(&engineer.engineer_id, pillar, period)?;
            // Latest prior row, not strictly period-1: a pillar that sat
            // out a period keeps its sparkline history.
            let prior_window = self
                .store
                .latest_pillar_score_before(&engineer.engineer_id, pillar, period)?
                .map(|s| s.sparkline)
                .unwrap_or_default();
            match compute_pillar_score(
                pillar,
                period,
                &signals,
                prior_window,
                weights,
                version,
                &self.config.trend,
                self.config.sparkline_window,
            ) {
                Some(score) => {
                    self.store
                        .upsert_pillar_score(&engineer.engineer_id, period, &score)?;
                    events.push(PulseEvent::PillarScored {
                        period,
                        engineer_id: engineer.engineer_id.clone(),
                        pillar,
                        score: score.score,
                        trend: score.trend,
                    });
                    pillars.push(score);
                }
                None => {
                    events.push(PulseEvent::PillarIncomplete {
                        period,
                        engineer_id: engineer.engineer_id.clone(),
                        pillar,
                    });
                }
            }
        }

        // 2. Composite.
        let prior_window = self
            .store
            .latest_composite_before(&engineer.engineer_id, period)?
            .map(|c| c.sparkline)
            .unwrap_or_default();
        let composite = compute_composite(
            &engineer.engineer_id,
            period,
            &pillars,
            prior_window,
            version,
            &self.config.trend,
            self.config.sparkline_window,
        );
        if let Some(composite) = &composite {
            self.store.upsert_composite(composite)?;
            events.push(PulseEvent::CompositeScored {
                period,
                engineer_id: engineer.engineer_id.clone(),
                value: composite.value,
                partial: composite.partial,
                trend: composite.trend,
                config_version: version,
            });
        }

        // 3. Detection.
        let snapshot = self.build_snapshot(engineer, period, pillars, composite)?;
        let outcome = self.detector.detect(&self.store, &snapshot)?;
        for alert in outcome.raised {
            events.push(PulseEvent::AlertRaised {
                period,
                alert_id: alert.alert_id,
                engineer_id: alert.engineer_id,
                pattern: alert.pattern.id().to_string(),
                severity: alert.severity,
            });
        }

        Ok(events)
    }

    fn build_snapshot(
        &self,
        engineer: &Engineer,
        period: Period,
        pillars: Vec<crate::scoring_subsystem::PillarScore>,
        composite: Option<crate::composite_subsystem::CompositeScore>,
    ) -> PulseResult<EngineerSnapshot> {
        let id = &engineer.engineer_id;
        let work_shape = match (
            self.store
                .signal_value(id, Pillar::Delivery, period, METRIC_WORK_ITEM_COUNT)?,
            self.store
                .signal_value(id, Pillar::Delivery, period, METRIC_AVG_ITEM_COMPLEXITY)?,
        ) {
            (Some(item_count), Some(avg_complexity)) => {
                let (prev_item_count, prev_avg_complexity) = match period.checked_sub(1) {
                    Some(p) => (
                        self.store
                            .signal_value(id, Pillar::Delivery, p, METRIC_WORK_ITEM_COUNT)?,
                        self.store.signal_value(
                            id,
                            Pillar::Delivery,
                            p,
                            METRIC_AVG_ITEM_COMPLEXITY,
                        )?,
                    ),
                    None => (None, None),
                };
                Some(WorkShape {
                    item_count,
                    prev_item_count,
                    avg_complexity,
                    prev_avg_complexity,
                })
            }
            _ => None,
        };

        Ok(EngineerSnapshot {
            engineer: engineer.clone(),
            period,
            pillars,
            composite,
            work_shape,
            checkin: self.store.checkin_for(id, period)?.map(|c| c.status),
            has_self_report: self.store.has_self_report(id, period)?,
        })
    }

    fn evaluate_due_actions(&self, period: Period) -> PulseResult<Vec<PulseEvent>> {
        let mut events = Vec::new();
        for action in self.store.completed_actions_unevaluated()? {
            match self.evaluator.evaluate(&self.store, &action, period)? {
                EvaluationOutcome::Evaluated {
                    effectiveness,
                    escalation,
                } => {
                    events.push(PulseEvent::EffectivenessEvaluated {
                        period,
                        action_id: effectiveness.action_id.clone(),
                        verdict: effectiveness.verdict.id().to_string(),
                        effectiveness_score: effectiveness.effectiveness_score,
                    });
                    if let Some(alert) = escalation {
                        events.push(PulseEvent::EscalationRaised {
                            period,
                            action_id: action.action_id.clone(),
                            alert_id: alert.alert_id,
                        });
                    }
                }
                EvaluationOutcome::NotYetEvaluable => {
                    log::debug!(
                        "period={period} effectiveness: action {} not yet evaluable",
                        action.action_id,
                    );
                }
                EvaluationOutcome::AlreadyEvaluated => {}
            }
        }
        Ok(events)
    }

    // ── Commands ───────────────────────────────────────────────

    /// Apply a collaborator command. Validation happens before any
    /// state change; accepted commands land in the event log.
    pub fn apply(&mut self, command: PulseCommand) -> PulseResult<Vec<PulseEvent>> {
        let period = self.clock.current_period;
        let events = match command {
            PulseCommand::AcknowledgeAlert { alert_id } => {
                self.store.acknowledge_alert(&alert_id)?;
                log::info!("period={period} command: acknowledged alert {alert_id}");
                vec![PulseEvent::AlertAcknowledged { period, alert_id }]
            }
            PulseCommand::CreateAction {
                engineer_id,
                description,
                due_date,
                pillar,
                alert_id,
                created_by,
            } => self.create_action(NewAction {
                engineer_id,
                description,
                due_date,
                pillar,
                alert_id,
                created_by,
            })?,
            PulseCommand::UpdateActionStatus { action_id, status } => {
                self.update_action_status(&action_id, status)?
            }
            PulseCommand::CompleteAction {
                action_id,
                resolution_note,
            } => self.complete_action(&action_id, &resolution_note)?,
            PulseCommand::UpdateWeight { pillar, weight } => {
                let (_, current) = self
                    .store
                    .current_weights()?
                    .ok_or_else(|| PulseError::config("no weight configuration written"))?;
                self.commit_weights(current.with_weight(pillar, weight))?
            }
            PulseCommand::UpdateWeights { weights } => self.commit_weights(weights)?,
            PulseCommand::TriggerRecompute { scope } => self.trigger_recompute(&scope)?,
        };
        self.append_events(period, &events)?;
        Ok(events)
    }

    fn create_action(&self, new_action: NewAction) -> PulseResult<Vec<PulseEvent>> {
        new_action.validate()?;
        let period = self.clock.current_period;

        // An alert-born action inherits the suggested pillar from the
        // alert's dominant affected metric.
        let mut pillar = new_action.pillar;
        if let Some(alert_id) = &new_action.alert_id {
            let alert = self
                .store
                .get_alert(alert_id)?
                .ok_or(PulseError::NotFound {
                    kind: "alert",
                    id: alert_id.clone(),
                })?;
            if pillar.is_none() {
                pillar = alert.dominant_pillar();
            }
        }

        let item = ActionItem {
            action_id: format!("act-{}", Uuid::new_v4()),
            engineer_id: new_action.engineer_id,
            alert_id: new_action.alert_id,
            description: new_action.description,
            status: ActionStatus::Open,
            due_date: new_action.due_date,
            pillar,
            created_by: new_action.created_by,
            created_at: chrono::Utc::now(),
            created_period: period,
            resolved_at: None,
            resolved_period: None,
            resolution_note: None,
        };
        self.store.insert_action(&item)?;

        log::info!(
            "period={period} command: action {} created for {}",
            item.action_id,
            item.engineer_id,
        );
        Ok(vec![PulseEvent::ActionCreated {
            period,
            action_id: item.action_id,
            engineer_id: item.engineer_id,
            alert_id: item.alert_id,
        }])
    }

    fn update_action_status(
        &self,
        action_id: &str,
        status: ActionStatus,
    ) -> PulseResult<Vec<PulseEvent>> {
        let item = self.store.get_action(action_id)?;
        apply_transition(&item, status)?;
        self.store.set_action_status(action_id, status)?;

        let period = self.clock.current_period;
        log::info!(
            "period={period} command: action {action_id} {} -> {}",
            item.status.id(),
            status.id(),
        );
        Ok(vec![PulseEvent::ActionStarted {
            period,
            action_id: action_id.to_string(),
        }])
    }

    fn complete_action(
        &self,
        action_id: &str,
        resolution_note: &str,
    ) -> PulseResult<Vec<PulseEvent>> {
        let item = self.store.get_action(action_id)?;
        apply_completion(&item, resolution_note)?;

        let period = self.clock.current_period;
        self.store.mark_action_completed(
            action_id,
            chrono::Utc::now(),
            period,
            resolution_note.trim(),
        )?;

        log::info!("period={period} command: action {action_id} completed");
        Ok(vec![PulseEvent::ActionCompleted {
            period,
            action_id: action_id.to_string(),
        }])
    }

    fn commit_weights(&self, candidate: WeightConfig) -> PulseResult<Vec<PulseEvent>> {
        let period = self.clock.current_period;
        if let Err(e) = candidate.validate() {
            // The rejection is auditable even though the command fails;
            // the prior version stays in effect.
            self.append_events(
                period,
                &[PulseEvent::WeightsRejected {
                    period,
                    reason: e.to_string(),
                }],
            )?;
            log::warn!("period={period} command: weight update rejected — {e}");
            return Err(e);
        }

        let version = self.store.insert_weights(&candidate)?;
        log::info!(
            "period={period} command: weights v{version} \
             ({}/{}/{}/{})",
            candidate.delivery,
            candidate.client_satisfaction,
            candidate.team_feedback,
            candidate.growth,
        );

        let mut events = vec![PulseEvent::WeightsUpdated {
            period,
            version,
            delivery: candidate.delivery,
            client_satisfaction: candidate.client_satisfaction,
            team_feedback: candidate.team_feedback,
            growth: candidate.growth,
        }];
        // Accepted weight changes recompute the current period.
        events.extend(self.trigger_recompute(&RecomputeScope::All)?);
        Ok(events)
    }

    /// Recompute scores for the current period. Idempotent per scope:
    /// a trigger while one is in flight coalesces instead of running a
    /// second pass over the same data.
    pub fn trigger_recompute(&self, scope: &RecomputeScope) -> PulseResult<Vec<PulseEvent>> {
        let period = self.clock.current_period;
        let key = scope.key();

        if !self.recompute.begin(&key) {
            log::info!("period={period} recompute: {key} already in flight, coalesced");
            return Ok(vec![PulseEvent::RecomputeCoalesced {
                period,
                scope: key,
            }]);
        }

        let result = self.run_scoped(period, scope);
        self.recompute.end(&key);
        let pass_events = result?;

        let (version, _) = self
            .store
            .current_weights()?
            .ok_or_else(|| PulseError::config("no weight configuration written"))?;
        let engineers = pass_events
            .iter()
            .filter(|e| matches!(e, PulseEvent::CompositeScored { .. }))
            .count();

        let mut events = vec![PulseEvent::RecomputeStarted {
            period,
            scope: key.clone(),
        }];
        events.extend(pass_events);
        events.push(PulseEvent::RecomputeCompleted {
            period,
            scope: key,
            engineers,
            config_version: version,
        });
        Ok(events)
    }

    // ── Read API ───────────────────────────────────────────────

    /// The roster projection for one period (portfolio input).
    pub fn roster(&self, period: Period) -> PulseResult<Vec<RosterEngineer>> {
        let mut rows = Vec::new();
        for engineer in self.store.list_engineers()? {
            let composite = self.store.composite(&engineer.engineer_id, period)?;
            let pillars = self.store.pillar_scores_for(&engineer.engineer_id, period)?;
            let open = self.store.open_alerts_for_engineer(&engineer.engineer_id)?;
            rows.push(RosterEngineer {
                engineer,
                composite,
                pillars,
                attention_status: attention_status(&open),
            });
        }
        Ok(rows)
    }

    // ── Event log ──────────────────────────────────────────────

    fn append_events(&self, period: Period, events: &[PulseEvent]) -> PulseResult<()> {
        for event in events {
            let entry = EventLogEntry {
                id: None,
                period,
                stage: stage_for(event).to_string(),
                event_type: event_type_name(event).to_string(),
                payload: serde_json::to_string(event)?,
            };
            self.store.append_event(&entry)?;
        }
        Ok(())
    }
}

/// Which pipeline stage or surface produced an event.
/// Used for the stage column in event_log.
fn stage_for(event: &PulseEvent) -> &'static str {
    match event {
        PulseEvent::PillarScored { .. }
        | PulseEvent::PillarIncomplete { .. }
        | PulseEvent::CompositeScored { .. } => "scoring",
        PulseEvent::AlertRaised { .. } => "detector",
        PulseEvent::AlertAcknowledged { .. }
        | PulseEvent::ActionCreated { .. }
        | PulseEvent::ActionStarted { .. }
        | PulseEvent::ActionCompleted { .. } => "actions",
        PulseEvent::EffectivenessEvaluated { .. }
        | PulseEvent::EscalationRaised { .. } => "effectiveness",
        PulseEvent::WeightsUpdated { .. }
        | PulseEvent::WeightsRejected { .. }
        | PulseEvent::RecomputeStarted { .. }
        | PulseEvent::RecomputeCompleted { .. }
        | PulseEvent::RecomputeCoalesced { .. } => "config",
    }
}
