//! Synthetic roster and signal-history generation.
//!
//! Used by pulse-runner to exercise a full pipeline headlessly and by
//! tests that want multi-period fixtures. Each engineer gets an
//! archetype whose signal drift reproduces one of the behavioral
//! patterns (or none), so a demo run raises every alert kind.

use crate::{
    rng::DemoRng,
    signal::{
        Engineer, LeadCheckin, RawSignal, SelfAssessment, SignalSource,
        METRIC_AVG_ITEM_COMPLEXITY, METRIC_WORK_ITEM_COUNT,
    },
    types::{CheckinStatus, EngineerLevel, Period, Pillar},
};
use chrono::Utc;

const FIRST_NAMES: &[&str] = &[
    "Avery", "Blake", "Casey", "Devon", "Ellis", "Frankie", "Harper", "Indra",
    "Jordan", "Kai", "Lennon", "Marlow", "Noor", "Oakley", "Priya", "Quinn",
    "Rowan", "Sasha", "Tatum", "Uma",
];

const LAST_NAMES: &[&str] = &[
    "Abara", "Brennan", "Castillo", "Duarte", "Eriksen", "Fontaine", "Grover",
    "Huang", "Ivanov", "Jacobs", "Kowalski", "Lindqvist", "Mbeki", "Navarro",
    "Okafor", "Petrova", "Quraishi", "Rahman", "Santos", "Tanaka",
];

const PROJECTS: &[&str] = &["atlas", "beacon", "corelight", "driftwood"];

/// Behavioral archetype driving an engineer's signal history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Archetype {
    /// Healthy baseline with mild jitter.
    Steady,
    /// Delivery declines period over period (slowdown spiral).
    Slowing,
    /// Team feedback declines and nothing self-reported (silent struggle).
    Quiet,
    /// Blocked check-ins with two declining pillars.
    Blocked,
    /// Growth flat while work shifts to many small items
    /// (complexity avoidance).
    Shrinking,
}

const ARCHETYPES: &[Archetype] = &[
    Archetype::Steady,
    Archetype::Slowing,
    Archetype::Quiet,
    Archetype::Blocked,
    Archetype::Shrinking,
];

#[derive(Debug, Clone)]
pub struct DemoEngineer {
    pub engineer: Engineer,
    pub archetype: Archetype,
    base_score: f64,
}

pub struct RosterGenerator {
    rng: DemoRng,
}

impl RosterGenerator {
    pub fn new(master_seed: u64) -> Self {
        Self {
            rng: DemoRng::new(master_seed, 0),
        }
    }

    /// Generate `count` engineers, cycling through the archetypes so
    /// every pattern is represented once the roster has five or more.
    pub fn generate_roster(&mut self, count: usize) -> Vec<DemoEngineer> {
        let levels = [
            EngineerLevel::Junior,
            EngineerLevel::Mid,
            EngineerLevel::Senior,
            EngineerLevel::Staff,
        ];
        (0..count)
            .map(|i| {
                let first = self.rng.pick(FIRST_NAMES);
                let last = self.rng.pick(LAST_NAMES);
                DemoEngineer {
                    engineer: Engineer {
                        engineer_id: format!("eng-{i:03}"),
                        name: format!("{first} {last}"),
                        level: levels[self.rng.next_u64_below(levels.len() as u64) as usize],
                        project: PROJECTS
                            [self.rng.next_u64_below(PROJECTS.len() as u64) as usize]
                            .to_string(),
                        started_period: 0,
                    },
                    archetype: ARCHETYPES[i % ARCHETYPES.len()],
                    base_score: self.rng.range_f64(70.0, 88.0),
                }
            })
            .collect()
    }

    /// One engineer's signals for one period.
    pub fn signals_for_period(
        &mut self,
        demo: &DemoEngineer,
        period: Period,
    ) -> PeriodSignals {
        let id = &demo.engineer.engineer_id;
        let now = Utc::now();
        let jitter = self.rng.range_f64(-2.0, 2.0);
        let elapsed = period.saturating_sub(1) as f64;
        let base = demo.base_score;

        // Per-pillar score trajectories by archetype.
        let (delivery, team, growth) = match demo.archetype {
            Archetype::Steady => (base, base, base),
            Archetype::Slowing => ((base - 6.0 * elapsed).max(20.0), base, base),
            Archetype::Quiet => (base, (base - 5.0 * elapsed).max(25.0), base),
            Archetype::Blocked => (
                (base - 4.0 * elapsed).max(30.0),
                base,
                (base - 4.0 * elapsed).max(30.0),
            ),
            Archetype::Shrinking => (base, base, base - 0.5 * elapsed),
        };
        let csat = base;

        let signal = |pillar: Pillar, metric: &str, value: f64, source: SignalSource| {
            RawSignal {
                engineer_id: id.clone(),
                pillar,
                metric: metric.to_string(),
                value,
                period,
                submitted_at: now,
                source,
            }
        };

        let mut signals = vec![
            signal(
                Pillar::Delivery,
                "throughput",
                delivery + jitter,
                SignalSource::Integration,
            ),
            signal(
                Pillar::Delivery,
                "review_quality",
                delivery - jitter,
                SignalSource::Integration,
            ),
            signal(
                Pillar::ClientSatisfaction,
                "csat",
                csat + jitter,
                SignalSource::Client,
            ),
            signal(
                Pillar::TeamFeedback,
                "peer_score",
                team + jitter,
                SignalSource::Lead,
            ),
            signal(
                Pillar::Growth,
                "trajectory",
                growth + jitter,
                SignalSource::Lead,
            ),
        ];

        // Delivery work shape. The shrinking archetype trades size for
        // volume; everyone else holds steady.
        let (count, complexity) = match demo.archetype {
            Archetype::Shrinking => {
                (8.0 + 3.0 * elapsed, (8.0 - 1.5 * elapsed).max(1.0))
            }
            _ => (8.0 + jitter.round(), 6.0),
        };
        signals.push(signal(
            Pillar::Delivery,
            METRIC_WORK_ITEM_COUNT,
            count,
            SignalSource::Integration,
        ));
        signals.push(signal(
            Pillar::Delivery,
            METRIC_AVG_ITEM_COMPLEXITY,
            complexity,
            SignalSource::Integration,
        ));

        let checkin = LeadCheckin {
            engineer_id: id.clone(),
            period,
            status: match demo.archetype {
                Archetype::Blocked if period >= 2 => CheckinStatus::Blocked,
                Archetype::Quiet => CheckinStatus::NeedsSupport,
                _ => CheckinStatus::OnTrack,
            },
            note: String::new(),
            submitted_at: now,
        };

        // The quiet archetype never self-reports; that silence is the
        // pattern.
        let self_assessment = match demo.archetype {
            Archetype::Quiet => None,
            _ => Some(SelfAssessment {
                engineer_id: id.clone(),
                period,
                rating: (base + jitter).clamp(0.0, 100.0),
                submitted_at: now,
            }),
        };

        PeriodSignals {
            signals,
            checkin,
            self_assessment,
        }
    }
}

pub struct PeriodSignals {
    pub signals: Vec<RawSignal>,
    pub checkin: LeadCheckin,
    pub self_assessment: Option<SelfAssessment>,
}
