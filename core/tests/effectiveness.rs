//! Post-action effectiveness: deferral, the three verdicts, and the
//! escalation loop back into detection.

use chrono::{Duration, Utc};
use pulse_core::{
    command::PulseCommand,
    config::EngineConfig,
    effectiveness_subsystem::Verdict,
    engine::PulseEngine,
    event::PulseEvent,
    signal::{Engineer, RawSignal, SelfAssessment, SignalSource},
    store::PulseStore,
    types::{EngineerLevel, Period, Pillar},
};

fn engineer(id: &str) -> Engineer {
    Engineer {
        engineer_id: id.to_string(),
        name: "Tatum Santos".to_string(),
        level: EngineerLevel::Senior,
        project: "driftwood".to_string(),
        started_period: 0,
    }
}

fn signal(id: &str, pillar: Pillar, value: f64, period: Period) -> RawSignal {
    RawSignal {
        engineer_id: id.to_string(),
        pillar,
        metric: "metric".to_string(),
        value,
        period,
        submitted_at: Utc::now(),
        source: SignalSource::Integration,
    }
}

fn seed_period(engine: &PulseEngine, id: &str, period: Period, team: f64) {
    for (pillar, value) in [
        (Pillar::Delivery, 85.0),
        (Pillar::ClientSatisfaction, 85.0),
        (Pillar::TeamFeedback, team),
        (Pillar::Growth, 85.0),
    ] {
        engine
            .store
            .insert_signal(&signal(id, pillar, value, period))
            .unwrap();
    }
    engine
        .store
        .insert_self_assessment(&SelfAssessment {
            engineer_id: id.to_string(),
            period,
            rating: 70.0,
            submitted_at: Utc::now(),
        })
        .unwrap();
}

/// Raise a team-feedback alert at period 1, hang an action off it and
/// complete the action in the same period.
fn setup_completed_action(engine: &mut PulseEngine, team_at_alert: f64) -> String {
    engine.store.insert_engineer(&engineer("e1")).unwrap();
    seed_period(engine, "e1", 1, team_at_alert);
    engine.score_period(1).unwrap();

    let alert_id = engine.store.open_alerts_for_engineer("e1").unwrap()[0]
        .alert_id
        .clone();
    let events = engine
        .apply(PulseCommand::CreateAction {
            engineer_id: "e1".to_string(),
            description: "Coach through review feedback".to_string(),
            due_date: Utc::now().date_naive() + Duration::days(7),
            pillar: None,
            alert_id: Some(alert_id),
            created_by: "lead-1".to_string(),
        })
        .unwrap();
    let PulseEvent::ActionCreated { action_id, .. } = &events[0] else {
        panic!("expected ActionCreated");
    };
    let action_id = action_id.clone();

    engine
        .apply(PulseCommand::CompleteAction {
            action_id: action_id.clone(),
            resolution_note: "Paired on PR review".to_string(),
        })
        .unwrap();
    action_id
}

#[test]
fn evaluation_defers_until_a_post_completion_period_exists() {
    let mut engine = PulseEngine::build_test().unwrap();
    let action_id = setup_completed_action(&mut engine, 45.0);

    // Re-closing the same period must not produce a premature verdict.
    engine.score_period(1).unwrap();
    assert!(engine.store.effectiveness_for(&action_id).unwrap().is_none());
    assert_eq!(engine.store.effectiveness_count().unwrap(), 0);
}

#[test]
fn metrics_back_inside_threshold_resolve() {
    // Mirror the healthy-threshold example: 60 -> 85 against 80.
    let store = PulseStore::in_memory().unwrap();
    store.migrate().unwrap();
    let mut config = EngineConfig::default_test();
    config
        .detector
        .pillar_thresholds
        .insert("team_feedback".to_string(), 80.0);
    let mut engine = PulseEngine::build(store, config).unwrap();

    let action_id = setup_completed_action(&mut engine, 60.0);

    seed_period(&engine, "e1", 2, 85.0);
    engine.score_period(2).unwrap();

    let effectiveness = engine
        .store
        .effectiveness_for(&action_id)
        .unwrap()
        .expect("evaluated exactly once the next period");
    assert_eq!(effectiveness.verdict, Verdict::Resolved);
    assert_eq!(effectiveness.evaluated_period, 2);
    assert!((effectiveness.effectiveness_score - 100.0).abs() < 1e-9);

    let delta = &effectiveness.metric_deltas[0];
    assert_eq!(delta.metric, "team_feedback");
    assert!((delta.value_at_alert - 60.0).abs() < 1e-9);
    assert!((delta.value_now - 85.0).abs() < 1e-9);
}

#[test]
fn continued_decline_escalates_with_exactly_one_new_alert() {
    let mut engine = PulseEngine::build_test().unwrap();
    let action_id = setup_completed_action(&mut engine, 58.0);

    seed_period(&engine, "e1", 2, 52.0);
    engine.score_period(2).unwrap();

    let effectiveness = engine
        .store
        .effectiveness_for(&action_id)
        .unwrap()
        .unwrap();
    assert_eq!(effectiveness.verdict, Verdict::Escalated);

    let escalations: Vec<_> = engine
        .store
        .alerts_for_engineer("e1")
        .unwrap()
        .into_iter()
        .filter(|a| a.context_action_id.as_deref() == Some(action_id.as_str()))
        .collect();
    assert_eq!(escalations.len(), 1, "exactly one escalation alert");
    assert_eq!(
        escalations[0].severity,
        pulse_core::types::Severity::Attention
    );

    // Evaluation is once-only: replaying the period adds nothing.
    engine.score_period(2).unwrap();
    assert_eq!(engine.store.effectiveness_count().unwrap(), 1);
    let escalations_after: Vec<_> = engine
        .store
        .alerts_for_engineer("e1")
        .unwrap()
        .into_iter()
        .filter(|a| a.context_action_id.is_some())
        .collect();
    assert_eq!(escalations_after.len(), 1);
}

#[test]
fn partial_improvement_keeps_monitoring() {
    let mut engine = PulseEngine::build_test().unwrap();
    let action_id = setup_completed_action(&mut engine, 50.0);

    // Better than before, still below the threshold of 60.
    seed_period(&engine, "e1", 2, 55.0);
    engine.score_period(2).unwrap();

    let effectiveness = engine
        .store
        .effectiveness_for(&action_id)
        .unwrap()
        .unwrap();
    assert_eq!(effectiveness.verdict, Verdict::Monitoring);
    assert!(effectiveness.effectiveness_score > 0.0);
    assert!(effectiveness.effectiveness_score < 100.0);
}

#[test]
fn standalone_action_tracks_its_declared_pillar() {
    let mut engine = PulseEngine::build_test().unwrap();
    engine.store.insert_engineer(&engineer("e1")).unwrap();

    // Delivery slightly unhealthy, everything else fine.
    for (pillar, value) in [
        (Pillar::Delivery, 55.0),
        (Pillar::ClientSatisfaction, 85.0),
        (Pillar::TeamFeedback, 85.0),
        (Pillar::Growth, 85.0),
    ] {
        engine
            .store
            .insert_signal(&signal("e1", pillar, value, 1))
            .unwrap();
    }
    engine
        .store
        .insert_self_assessment(&SelfAssessment {
            engineer_id: "e1".to_string(),
            period: 1,
            rating: 70.0,
            submitted_at: Utc::now(),
        })
        .unwrap();
    engine.score_period(1).unwrap();

    let events = engine
        .apply(PulseCommand::CreateAction {
            engineer_id: "e1".to_string(),
            description: "Protect focus time".to_string(),
            due_date: Utc::now().date_naive() + Duration::days(7),
            pillar: Some(Pillar::Delivery),
            alert_id: None,
            created_by: "lead-1".to_string(),
        })
        .unwrap();
    let PulseEvent::ActionCreated { action_id, .. } = &events[0] else {
        panic!("expected ActionCreated");
    };
    let action_id = action_id.clone();
    engine
        .apply(PulseCommand::CompleteAction {
            action_id: action_id.clone(),
            resolution_note: "Blocked out deep-work mornings".to_string(),
        })
        .unwrap();

    for (pillar, value) in [
        (Pillar::Delivery, 65.0),
        (Pillar::ClientSatisfaction, 85.0),
        (Pillar::TeamFeedback, 85.0),
        (Pillar::Growth, 85.0),
    ] {
        engine
            .store
            .insert_signal(&signal("e1", pillar, value, 2))
            .unwrap();
    }
    engine.score_period(2).unwrap();

    let effectiveness = engine
        .store
        .effectiveness_for(&action_id)
        .unwrap()
        .unwrap();
    assert_eq!(effectiveness.verdict, Verdict::Resolved);
    assert_eq!(effectiveness.metric_deltas.len(), 1);
    assert_eq!(effectiveness.metric_deltas[0].metric, "delivery");
}
