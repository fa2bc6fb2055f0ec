//! Alert pattern detection: the five rules, severity, duplicate
//! suppression and the acknowledge lifecycle.

use chrono::Utc;
use pulse_core::{
    alert_subsystem::PatternKind,
    command::{PulseCommand, RecomputeScope},
    engine::PulseEngine,
    signal::{
        Engineer, LeadCheckin, RawSignal, SelfAssessment, SignalSource,
        METRIC_AVG_ITEM_COMPLEXITY, METRIC_WORK_ITEM_COUNT,
    },
    types::{CheckinStatus, EngineerLevel, Period, Pillar, Severity, Trend},
};

fn engineer(id: &str) -> Engineer {
    Engineer {
        engineer_id: id.to_string(),
        name: "Rowan Okafor".to_string(),
        level: EngineerLevel::Mid,
        project: "atlas".to_string(),
        started_period: 0,
    }
}

fn signal(id: &str, pillar: Pillar, metric: &str, value: f64, period: Period) -> RawSignal {
    RawSignal {
        engineer_id: id.to_string(),
        pillar,
        metric: metric.to_string(),
        value,
        period,
        submitted_at: Utc::now(),
        source: SignalSource::Integration,
    }
}

fn self_assessment(id: &str, period: Period) -> SelfAssessment {
    SelfAssessment {
        engineer_id: id.to_string(),
        period,
        rating: 75.0,
        submitted_at: Utc::now(),
    }
}

/// Seed one period: per-pillar values plus a self-assessment so
/// silent-struggle stays quiet unless a test wants it.
fn seed_period(
    engine: &PulseEngine,
    id: &str,
    period: Period,
    delivery: f64,
    csat: f64,
    team: f64,
    growth: f64,
) {
    engine
        .store
        .insert_signal(&signal(id, Pillar::Delivery, "throughput", delivery, period))
        .unwrap();
    engine
        .store
        .insert_signal(&signal(id, Pillar::ClientSatisfaction, "csat", csat, period))
        .unwrap();
    engine
        .store
        .insert_signal(&signal(id, Pillar::TeamFeedback, "peer_score", team, period))
        .unwrap();
    engine
        .store
        .insert_signal(&signal(id, Pillar::Growth, "trajectory", growth, period))
        .unwrap();
    engine
        .store
        .insert_self_assessment(&self_assessment(id, period))
        .unwrap();
}

fn alerts_of(engine: &PulseEngine, id: &str, pattern: PatternKind) -> Vec<pulse_core::alert_subsystem::Alert> {
    engine
        .store
        .alerts_for_engineer(id)
        .unwrap()
        .into_iter()
        .filter(|a| a.pattern == pattern)
        .collect()
}

#[test]
fn slowdown_spiral_fires_attention_on_monotonic_decline() {
    let mut engine = PulseEngine::build_test().unwrap();
    engine.store.insert_engineer(&engineer("e1")).unwrap();

    // The canonical spiral: six periods of monotonic delivery decline.
    let values = [80.0, 78.0, 74.0, 70.0, 65.0, 60.0];
    for (i, value) in values.iter().enumerate() {
        let period = i as Period + 1;
        seed_period(&engine, "e1", period, *value, 80.0, 80.0, 80.0);
        engine.score_period(period).unwrap();
    }

    let delivery = engine
        .store
        .pillar_score("e1", 6, Pillar::Delivery)
        .unwrap()
        .unwrap();
    assert_eq!(delivery.trend, Trend::Declining);

    let spirals = alerts_of(&engine, "e1", PatternKind::SlowdownSpiral);
    assert_eq!(spirals.len(), 1, "one open spiral alert, not one per period");
    assert_eq!(spirals[0].severity, Severity::Attention);
}

#[test]
fn rerunning_detection_never_duplicates_alerts() {
    let mut engine = PulseEngine::build_test().unwrap();
    engine.store.insert_engineer(&engineer("e1")).unwrap();

    for (i, value) in [80.0, 75.0, 70.0].iter().enumerate() {
        let period = i as Period + 1;
        seed_period(&engine, "e1", period, *value, 80.0, 80.0, 80.0);
        engine.score_period(period).unwrap();
    }
    let before = engine.store.alert_count().unwrap();
    assert!(before > 0, "the setup should have raised something");

    // Identical input, detection run again.
    engine
        .apply(PulseCommand::TriggerRecompute {
            scope: RecomputeScope::All,
        })
        .unwrap();
    engine
        .apply(PulseCommand::TriggerRecompute {
            scope: RecomputeScope::All,
        })
        .unwrap();

    assert_eq!(engine.store.alert_count().unwrap(), before);
}

#[test]
fn single_metric_mild_breach_monitors_severe_demands_attention() {
    let mut engine = PulseEngine::build_test().unwrap();
    engine.store.insert_engineer(&engineer("mild")).unwrap();
    engine.store.insert_engineer(&engineer("severe")).unwrap();

    // Threshold 60, mild margin 10% => mild floor 54.
    seed_period(&engine, "mild", 1, 80.0, 80.0, 55.0, 80.0);
    seed_period(&engine, "severe", 1, 80.0, 80.0, 45.0, 80.0);
    engine.score_period(1).unwrap();

    let mild = alerts_of(&engine, "mild", PatternKind::SingleMetric);
    assert_eq!(mild.len(), 1);
    assert_eq!(mild[0].severity, Severity::Monitor);
    assert_eq!(mild[0].affected_metrics.len(), 1);
    assert_eq!(mild[0].affected_metrics[0].name, "team_feedback");

    let severe = alerts_of(&engine, "severe", PatternKind::SingleMetric);
    assert_eq!(severe.len(), 1);
    assert_eq!(severe[0].severity, Severity::Attention);
}

#[test]
fn single_metric_suppressed_when_composite_partial() {
    let mut engine = PulseEngine::build_test().unwrap();
    engine.store.insert_engineer(&engineer("e1")).unwrap();

    // Team breaches, but growth never reported: partial data.
    engine
        .store
        .insert_signal(&signal("e1", Pillar::Delivery, "throughput", 80.0, 1))
        .unwrap();
    engine
        .store
        .insert_signal(&signal("e1", Pillar::ClientSatisfaction, "csat", 80.0, 1))
        .unwrap();
    engine
        .store
        .insert_signal(&signal("e1", Pillar::TeamFeedback, "peer_score", 45.0, 1))
        .unwrap();
    engine
        .store
        .insert_self_assessment(&self_assessment("e1", 1))
        .unwrap();

    engine.score_period(1).unwrap();

    assert!(engine.store.composite("e1", 1).unwrap().unwrap().partial);
    assert!(
        alerts_of(&engine, "e1", PatternKind::SingleMetric).is_empty(),
        "partial data must not raise a single-metric alert"
    );
}

#[test]
fn silent_struggle_needs_decline_and_missing_self_report() {
    let mut engine = PulseEngine::build_test().unwrap();
    engine.store.insert_engineer(&engineer("quiet")).unwrap();
    engine.store.insert_engineer(&engineer("vocal")).unwrap();

    for (i, team) in [80.0, 74.0, 68.0].iter().enumerate() {
        let period = i as Period + 1;
        for id in ["quiet", "vocal"] {
            engine
                .store
                .insert_signal(&signal(id, Pillar::Delivery, "throughput", 80.0, period))
                .unwrap();
            engine
                .store
                .insert_signal(&signal(id, Pillar::ClientSatisfaction, "csat", 80.0, period))
                .unwrap();
            engine
                .store
                .insert_signal(&signal(id, Pillar::TeamFeedback, "peer_score", *team, period))
                .unwrap();
            engine
                .store
                .insert_signal(&signal(id, Pillar::Growth, "trajectory", 80.0, period))
                .unwrap();
        }
        // Only one of them speaks up.
        engine
            .store
            .insert_self_assessment(&self_assessment("vocal", period))
            .unwrap();
        engine.score_period(period).unwrap();
    }

    let quiet = alerts_of(&engine, "quiet", PatternKind::SilentStruggle);
    assert_eq!(quiet.len(), 1);
    assert_eq!(quiet[0].severity, Severity::Attention);
    assert!(
        alerts_of(&engine, "vocal", PatternKind::SilentStruggle).is_empty(),
        "a self-report keeps silent-struggle quiet"
    );
}

#[test]
fn blocked_and_declining_needs_blocked_checkin_and_two_pillars() {
    let mut engine = PulseEngine::build_test().unwrap();
    engine.store.insert_engineer(&engineer("e1")).unwrap();

    for (i, value) in [80.0, 74.0, 68.0].iter().enumerate() {
        let period = i as Period + 1;
        // Delivery and growth decline together.
        seed_period(&engine, "e1", period, *value, 80.0, 80.0, *value);
        engine
            .store
            .insert_checkin(&LeadCheckin {
                engineer_id: "e1".to_string(),
                period,
                status: if period == 3 {
                    CheckinStatus::Blocked
                } else {
                    CheckinStatus::OnTrack
                },
                note: String::new(),
                submitted_at: Utc::now(),
            })
            .unwrap();
        engine.score_period(period).unwrap();
    }

    let blocked = alerts_of(&engine, "e1", PatternKind::BlockedAndDeclining);
    assert_eq!(blocked.len(), 1);
    assert_eq!(blocked[0].severity, Severity::Attention);
    assert_eq!(blocked[0].period, 3, "fires only once the check-in says blocked");
    assert!(blocked[0].affected_metrics.len() >= 2);
}

#[test]
fn complexity_avoidance_flags_flat_growth_with_shrinking_work() {
    let mut engine = PulseEngine::build_test().unwrap();
    engine.store.insert_engineer(&engineer("e1")).unwrap();

    let shapes = [(8.0, 8.0), (8.0, 8.0), (12.0, 5.0)];
    for (i, (count, complexity)) in shapes.iter().enumerate() {
        let period = i as Period + 1;
        seed_period(&engine, "e1", period, 80.0, 80.0, 80.0, 70.0);
        engine
            .store
            .insert_signal(&signal(
                "e1",
                Pillar::Delivery,
                METRIC_WORK_ITEM_COUNT,
                *count,
                period,
            ))
            .unwrap();
        engine
            .store
            .insert_signal(&signal(
                "e1",
                Pillar::Delivery,
                METRIC_AVG_ITEM_COMPLEXITY,
                *complexity,
                period,
            ))
            .unwrap();
        engine.score_period(period).unwrap();
    }

    let avoidance = alerts_of(&engine, "e1", PatternKind::ComplexityAvoidance);
    assert_eq!(avoidance.len(), 1);
    assert_eq!(avoidance[0].severity, Severity::Monitor);
    assert_eq!(avoidance[0].period, 3);
}

#[test]
fn acknowledged_alert_allows_a_fresh_firing() {
    let mut engine = PulseEngine::build_test().unwrap();
    engine.store.insert_engineer(&engineer("e1")).unwrap();

    for (i, value) in [80.0, 75.0, 70.0].iter().enumerate() {
        let period = i as Period + 1;
        seed_period(&engine, "e1", period, *value, 80.0, 80.0, 80.0);
        engine.score_period(period).unwrap();
    }

    let spiral = alerts_of(&engine, "e1", PatternKind::SlowdownSpiral)
        .pop()
        .expect("spiral should fire");
    assert!(!spiral.acknowledged);

    engine
        .apply(PulseCommand::AcknowledgeAlert {
            alert_id: spiral.alert_id.clone(),
        })
        .unwrap();
    assert!(engine.store.open_alerts_for_engineer("e1").unwrap().is_empty());

    // Next period still spirals: with the old alert acknowledged the
    // pattern may fire again.
    seed_period(&engine, "e1", 4, 65.0, 80.0, 80.0, 80.0);
    engine.score_period(4).unwrap();

    assert_eq!(alerts_of(&engine, "e1", PatternKind::SlowdownSpiral).len(), 2);
}
