//! Portfolio rollup: attention status, filtering, sorting and trend
//! buckets over the roster projection.

use chrono::Utc;
use pulse_core::{
    alert_subsystem::{Alert, PatternKind},
    composite_subsystem::CompositeScore,
    engine::PulseEngine,
    portfolio_subsystem::{
        attention_status, filter_roster, group_by_trend, sort_roster, PortfolioFilter,
        PortfolioSort, RosterEngineer,
    },
    signal::{Engineer, RawSignal, SelfAssessment, SignalSource},
    types::{AttentionStatus, EngineerLevel, Period, Pillar, Severity, SparkPoint, Trend},
};

fn alert(severity: Severity, acknowledged: bool) -> Alert {
    Alert {
        alert_id: "al-1-e1-single_metric".to_string(),
        engineer_id: "e1".to_string(),
        period: 1,
        severity,
        pattern: PatternKind::SingleMetric,
        fingerprint: "single_metric:delivery".to_string(),
        trigger_description: "Delivery below threshold".to_string(),
        affected_metrics: Vec::new(),
        score_snapshot: None,
        acknowledged,
        context_action_id: None,
        triggered_at: Utc::now(),
    }
}

fn row(name: &str, project: &str, level: EngineerLevel, composite: Option<(i64, Trend)>) -> RosterEngineer {
    RosterEngineer {
        engineer: Engineer {
            engineer_id: name.to_lowercase().replace(' ', "-"),
            name: name.to_string(),
            level,
            project: project.to_string(),
            started_period: 0,
        },
        composite: composite.map(|(value, trend)| CompositeScore {
            engineer_id: name.to_lowercase(),
            period: 1,
            value,
            partial: false,
            trend,
            sparkline: vec![SparkPoint { period: 1, value: value as f64 }],
            config_version: 1,
        }),
        pillars: Vec::new(),
        attention_status: AttentionStatus::Healthy,
    }
}

#[test]
fn attention_rollup_takes_most_severe_open_alert() {
    assert_eq!(attention_status(&[]), AttentionStatus::Healthy);
    assert_eq!(
        attention_status(&[alert(Severity::Monitor, false)]),
        AttentionStatus::Monitor
    );
    assert_eq!(
        attention_status(&[
            alert(Severity::Monitor, false),
            alert(Severity::Attention, false)
        ]),
        AttentionStatus::Attention
    );
    assert_eq!(
        attention_status(&[alert(Severity::Attention, true)]),
        AttentionStatus::Healthy,
        "acknowledged alerts no longer demand attention"
    );
}

#[test]
fn filters_compose_conjunctively() {
    let roster = vec![
        row("Avery Lee", "atlas", EngineerLevel::Mid, Some((80, Trend::Stable))),
        row("Blake Ito", "atlas", EngineerLevel::Senior, Some((70, Trend::Declining))),
        row("Casey Poe", "beacon", EngineerLevel::Mid, Some((90, Trend::Improving))),
    ];

    let by_project = filter_roster(
        roster.clone(),
        &PortfolioFilter {
            project: Some("atlas".to_string()),
            ..Default::default()
        },
    );
    assert_eq!(by_project.len(), 2);

    let by_both = filter_roster(
        roster.clone(),
        &PortfolioFilter {
            project: Some("atlas".to_string()),
            level: Some(EngineerLevel::Senior),
            ..Default::default()
        },
    );
    assert_eq!(by_both.len(), 1);
    assert_eq!(by_both[0].engineer.name, "Blake Ito");

    let by_search = filter_roster(
        roster,
        &PortfolioFilter {
            search: Some("cAsEy".to_string()),
            ..Default::default()
        },
    );
    assert_eq!(by_search.len(), 1, "search is case-insensitive");
}

#[test]
fn trend_sorts_by_fixed_ordinal() {
    let mut roster = vec![
        row("A", "atlas", EngineerLevel::Mid, Some((80, Trend::Improving))),
        row("B", "atlas", EngineerLevel::Mid, Some((80, Trend::Declining))),
        row("C", "atlas", EngineerLevel::Mid, Some((80, Trend::Stable))),
    ];

    sort_roster(&mut roster, PortfolioSort::Trend, false);
    let names: Vec<&str> = roster.iter().map(|r| r.engineer.name.as_str()).collect();
    assert_eq!(names, vec!["B", "C", "A"], "declining < stable < improving");
}

#[test]
fn composite_sort_descending_puts_best_first() {
    let mut roster = vec![
        row("A", "atlas", EngineerLevel::Mid, Some((70, Trend::Stable))),
        row("B", "atlas", EngineerLevel::Mid, Some((90, Trend::Stable))),
        row("C", "atlas", EngineerLevel::Mid, None),
    ];

    sort_roster(&mut roster, PortfolioSort::Composite, true);
    let names: Vec<&str> = roster.iter().map(|r| r.engineer.name.as_str()).collect();
    assert_eq!(names, vec!["B", "A", "C"], "unscored sink to the bottom");
}

#[test]
fn trend_buckets_cover_every_row_once() {
    let roster = vec![
        row("A", "atlas", EngineerLevel::Mid, Some((80, Trend::Improving))),
        row("B", "atlas", EngineerLevel::Mid, Some((60, Trend::Declining))),
        row("C", "atlas", EngineerLevel::Mid, Some((75, Trend::Stable))),
        row("D", "atlas", EngineerLevel::Mid, None),
    ];

    let buckets = group_by_trend(roster);
    assert_eq!(buckets.improving.len(), 1);
    assert_eq!(buckets.stable.len(), 1);
    assert_eq!(buckets.declining.len(), 1);
    assert_eq!(buckets.unscored.len(), 1);
}

#[test]
fn engine_roster_reflects_open_alerts() {
    let mut engine = PulseEngine::build_test().unwrap();
    for id in ["healthy", "flagged"] {
        engine
            .store
            .insert_engineer(&Engineer {
                engineer_id: id.to_string(),
                name: id.to_string(),
                level: EngineerLevel::Mid,
                project: "atlas".to_string(),
                started_period: 0,
            })
            .unwrap();
    }

    let seed = |id: &str, team: f64, period: Period| {
        for (pillar, value) in [
            (Pillar::Delivery, 85.0),
            (Pillar::ClientSatisfaction, 85.0),
            (Pillar::TeamFeedback, team),
            (Pillar::Growth, 85.0),
        ] {
            engine
                .store
                .insert_signal(&RawSignal {
                    engineer_id: id.to_string(),
                    pillar,
                    metric: "metric".to_string(),
                    value,
                    period,
                    submitted_at: Utc::now(),
                    source: SignalSource::Integration,
                })
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
    };
    seed("healthy", 85.0, 1);
    seed("flagged", 45.0, 1);
    engine.score_period(1).unwrap();

    let roster = engine.roster(1).unwrap();
    let get = |id: &str| roster.iter().find(|r| r.engineer.engineer_id == id).unwrap();

    assert_eq!(get("healthy").attention_status, AttentionStatus::Healthy);
    assert_eq!(get("flagged").attention_status, AttentionStatus::Attention);
    assert_eq!(get("flagged").pillars.len(), 4);
    assert!(get("flagged").composite.is_some());
}

#[test]
fn reassignment_moves_an_engineer_between_project_filters() {
    let engine = PulseEngine::build_test().unwrap();
    engine
        .store
        .insert_engineer(&Engineer {
            engineer_id: "e1".to_string(),
            name: "Lennon Huang".to_string(),
            level: EngineerLevel::Mid,
            project: "atlas".to_string(),
            started_period: 0,
        })
        .unwrap();

    engine
        .store
        .update_engineer_assignment("e1", EngineerLevel::Senior, "beacon")
        .unwrap();

    assert!(engine.store.engineers_in_project("atlas").unwrap().is_empty());
    let moved = engine.store.engineers_in_project("beacon").unwrap();
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].level, EngineerLevel::Senior);
    assert_eq!(
        moved[0].engineer_id, "e1",
        "identity never changes on reassignment"
    );
}
