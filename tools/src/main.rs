//! pulse-runner: headless pipeline runner for the pulse engine.
//!
//! Seeds a synthetic roster, ingests generated signals period by
//! period, scores each period, walks one action through its lifecycle
//! and prints an end-of-run summary.
//!
//! Usage:
//!   pulse-runner --seed 12345 --periods 6 --engineers 10 --db pulse.db

use anyhow::Result;
use pulse_core::{
    command::PulseCommand,
    config::EngineConfig,
    engine::PulseEngine,
    event::PulseEvent,
    roster_gen::{DemoEngineer, RosterGenerator},
    store::PulseStore,
    types::Period,
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let periods = parse_arg(&args, "--periods", 6u64);
    let engineers = parse_arg(&args, "--engineers", 10u64) as usize;
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or(":memory:");
    let data_dir = args
        .windows(2)
        .find(|w| w[0] == "--data-dir")
        .map(|w| w[1].as_str())
        .unwrap_or("./data");

    println!("engineering pulse — pulse-runner");
    println!("  seed:      {seed}");
    println!("  periods:   {periods}");
    println!("  engineers: {engineers}");
    println!("  db:        {db}");
    println!("  data_dir:  {data_dir}");
    println!();

    let store = if db == ":memory:" {
        PulseStore::in_memory()?
    } else {
        PulseStore::open(db)?
    };
    store.migrate()?;

    let config = match EngineConfig::load(data_dir) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("config load failed ({e}); using defaults");
            EngineConfig::default_test()
        }
    };

    let mut engine = PulseEngine::build(store, config)?;

    let mut generator = RosterGenerator::new(seed);
    let roster = generator.generate_roster(engineers);
    for demo in &roster {
        engine.store.insert_engineer(&demo.engineer)?;
    }

    let mut alerts_raised = 0usize;
    for _ in 0..periods {
        let period = engine.advance_period();
        ingest_period(&engine, &mut generator, &roster, period)?;
        let events = engine.score_period(period)?;
        alerts_raised += events
            .iter()
            .filter(|e| matches!(e, PulseEvent::AlertRaised { .. }))
            .count();
    }

    walk_action_lifecycle(&mut engine, &mut generator, &roster)?;
    if args.iter().any(|a| a == "--json") {
        let summary = RunSummary {
            period: engine.current_period(),
            alerts_raised,
            alerts_in_store: engine.store.alert_count()?,
            roster: engine.roster(engine.current_period())?,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&engine, alerts_raised)?;
    }

    Ok(())
}

#[derive(serde::Serialize)]
struct RunSummary {
    period: Period,
    alerts_raised: usize,
    alerts_in_store: i64,
    roster: Vec<pulse_core::portfolio_subsystem::RosterEngineer>,
}

fn ingest_period(
    engine: &PulseEngine,
    generator: &mut RosterGenerator,
    roster: &[DemoEngineer],
    period: Period,
) -> Result<()> {
    for demo in roster {
        let bundle = generator.signals_for_period(demo, period);
        for signal in &bundle.signals {
            engine.store.insert_signal(signal)?;
        }
        engine.store.insert_checkin(&bundle.checkin)?;
        if let Some(assessment) = &bundle.self_assessment {
            engine.store.insert_self_assessment(assessment)?;
        }
    }
    Ok(())
}

/// Take the first open alert through create → start → complete, then
/// run one more period so the effectiveness evaluator gets its
/// post-completion data.
fn walk_action_lifecycle(
    engine: &mut PulseEngine,
    generator: &mut RosterGenerator,
    roster: &[DemoEngineer],
) -> Result<()> {
    let flagged = roster.iter().find_map(|demo| {
        engine
            .store
            .open_alerts_for_engineer(&demo.engineer.engineer_id)
            .ok()
            .and_then(|alerts| alerts.into_iter().next())
    });
    let Some(alert) = flagged else {
        println!("no open alerts; skipping action walkthrough");
        return Ok(());
    };
    if let Some(engineer) = engine.store.get_engineer(&alert.engineer_id)? {
        println!(
            "walking an action for {} ({}): {}",
            engineer.name,
            alert.pattern.id(),
            alert.trigger_description,
        );
    }

    let due = chrono::Utc::now().date_naive() + chrono::Duration::days(14);
    let events = engine.apply(PulseCommand::CreateAction {
        engineer_id: alert.engineer_id.clone(),
        description: format!("Follow up on {}", alert.pattern.id()),
        due_date: due,
        pillar: None,
        alert_id: Some(alert.alert_id.clone()),
        created_by: "runner".to_string(),
    })?;
    let Some(PulseEvent::ActionCreated { action_id, .. }) = events.first() else {
        anyhow::bail!("action creation produced no event");
    };
    let action_id = action_id.clone();

    engine.apply(PulseCommand::UpdateActionStatus {
        action_id: action_id.clone(),
        status: pulse_core::action_subsystem::ActionStatus::InProgress,
    })?;
    engine.apply(PulseCommand::CompleteAction {
        action_id: action_id.clone(),
        resolution_note: "Paired through the backlog and unblocked reviews".to_string(),
    })?;

    let period = engine.advance_period();
    ingest_period(engine, generator, roster, period)?;
    engine.score_period(period)?;

    if let Some(effectiveness) = engine.store.effectiveness_for(&action_id)? {
        println!(
            "action {action_id}: verdict={} score={:.0}",
            effectiveness.verdict.id(),
            effectiveness.effectiveness_score,
        );
        println!();
    }
    Ok(())
}

fn print_summary(engine: &PulseEngine, alerts_raised: usize) -> Result<()> {
    let period = engine.current_period();
    let roster = engine.roster(period)?;

    println!("── roster, period {period} ─────────────────────────────");
    for row in &roster {
        let composite = row
            .composite
            .as_ref()
            .map(|c| format!("{:3}{}", c.value, if c.partial { "*" } else { " " }))
            .unwrap_or_else(|| "  —".to_string());
        let trend = row
            .trend()
            .map(|t| t.id())
            .unwrap_or("—");
        println!(
            "  {:<22} {:<10} {composite} {:<10} {}",
            row.engineer.name,
            row.engineer.project,
            trend,
            row.attention_status.id(),
        );
    }
    println!();
    println!("  alerts raised over run: {alerts_raised}");
    println!("  alerts in store:        {}", engine.store.alert_count()?);
    println!(
        "  effectiveness records:  {}",
        engine.store.effectiveness_count()?
    );
    Ok(())
}

fn parse_arg(args: &[String], flag: &str, default: u64) -> u64 {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
