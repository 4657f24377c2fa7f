//! Randomized run simulator
//!
//! Drives many people-finder runs against the demo backend with random
//! latencies, failures, teardowns, resets and re-submits, sampling the
//! controller while it runs.
//!
//! Checked on every run:
//! - phases are entered in plan order, each at most once
//! - the phase and every result slot only move forward
//! - nothing changes after teardown, including notifications
//! - a re-submitted or reset run leaves no trace in the current state
//! - malformed queries never leave `Idle`

use crate::demo::DemoBackend;
use futures::future::join_all;
use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use unveil_core::{
    FinderPayload, Notifier, PeopleFinder, Phase, PhaseResult, RunId, SearchQuery, Snapshot,
    UnveilConfig,
};

const SAMPLE_EVERY: Duration = Duration::from_millis(2);
const SLACK: Duration = Duration::from_millis(500);

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Number of runs to simulate
    pub runs: u64,
    /// Runs in flight at once
    pub concurrency: usize,
    /// Stop after the batch that produced the first violation
    pub stop_on_first_violation: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            runs: 200,
            concurrency: 16,
            stop_on_first_violation: false,
        }
    }
}

/// What happens to a run after submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Let it finish
    Complete,
    /// Tear the finder down after the delay
    Teardown(Duration),
    /// Submit a second query after the delay
    Resubmit(Duration),
    /// Reset after the delay
    Reset(Duration),
}

/// One randomly generated run
#[derive(Debug, Clone)]
pub struct Scenario {
    pub id: u64,
    pub query: SearchQuery,
    /// Whether the query is well-formed
    pub valid: bool,
    pub dwell: Duration,
    pub account_latency: Duration,
    pub record_latency: Duration,
    pub fail_accounts: bool,
    pub fail_records: bool,
    pub prefetch: bool,
    pub action: Action,
}

impl Scenario {
    /// Upper bound on the time a run needs to finish
    fn budget(&self) -> Duration {
        self.dwell + self.dwell.max(self.account_latency) + self.dwell.max(self.record_latency)
            + SLACK
    }

    /// Long enough for every timer and lookup of a run to have fired
    fn quiet_period(&self) -> Duration {
        self.dwell * 3 + self.account_latency + self.record_latency + Duration::from_millis(20)
    }
}

/// A violation detected during simulation
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    /// Phases entered out of order or repeated
    PhaseOrder { scenario: u64, phases: Vec<Phase> },
    /// Phase moved backwards within a run
    PhaseRegressed { scenario: u64, from: Phase, to: Phase },
    /// A result slot moved backwards within a run
    ResultRegressed { scenario: u64, index: usize },
    /// State or notifications changed after teardown
    WriteAfterTeardown { scenario: u64 },
    /// An abandoned run is still visible
    StaleRunVisible { scenario: u64 },
    /// A run did not finish within its budget
    Incomplete { scenario: u64, phase: Phase },
    /// A malformed query started a run
    InvalidQueryAccepted { scenario: u64 },
    /// A well-formed query was rejected
    ValidQueryRejected { scenario: u64, error: String },
}

/// Statistics for simulation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulatorStats {
    pub runs: u64,
    pub completed: u64,
    pub torn_down: u64,
    pub resubmitted: u64,
    pub reset: u64,
    pub rejected_queries: u64,
    pub lookup_failures: u64,
    pub samples: u64,
}

impl SimulatorStats {
    fn merge(&mut self, other: &Self) {
        self.runs += other.runs;
        self.completed += other.completed;
        self.torn_down += other.torn_down;
        self.resubmitted += other.resubmitted;
        self.reset += other.reset;
        self.rejected_queries += other.rejected_queries;
        self.lookup_failures += other.lookup_failures;
        self.samples += other.samples;
    }
}

/// Final report from simulator
#[derive(Debug, Clone)]
pub struct SimulatorReport {
    pub config: SimulatorConfig,
    pub stats: SimulatorStats,
    pub violations: Vec<Violation>,
}

impl SimulatorReport {
    /// Check if simulation passed all criteria
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Generate text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Unveil Simulator Report ===\n\n");
        report.push_str(&format!("Seed: {}\n", self.config.seed));
        report.push_str(&format!("Runs: {}\n", self.stats.runs));
        report.push_str(&format!("Completed: {}\n", self.stats.completed));
        report.push_str(&format!("Torn Down: {}\n", self.stats.torn_down));
        report.push_str(&format!("Resubmitted: {}\n", self.stats.resubmitted));
        report.push_str(&format!("Reset: {}\n", self.stats.reset));
        report.push_str(&format!("Rejected Queries: {}\n", self.stats.rejected_queries));
        report.push_str(&format!("Lookup Failures: {}\n", self.stats.lookup_failures));
        report.push_str(&format!("Samples: {}\n", self.stats.samples));
        report.push_str(&format!("Violations: {}\n", self.violations.len()));

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                report.push_str(&format!("{}. {:?}\n", i + 1, v));
            }
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));
        report
    }
}

/// Notifier that keeps the phase log of every run
#[derive(Debug, Default)]
struct PhaseLog {
    entries: Mutex<Vec<(RunId, Phase)>>,
    failures: Mutex<u64>,
}

impl PhaseLog {
    fn phases(&self, run: RunId) -> Vec<Phase> {
        self.entries
            .lock()
            .iter()
            .filter(|(r, _)| *r == run)
            .map(|(_, phase)| *phase)
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

impl Notifier for PhaseLog {
    fn phase_entered(&self, run: RunId, phase: Phase) {
        self.entries.lock().push((run, phase));
    }

    fn lookup_failed(&self, _run: RunId, _index: usize, _reason: &str) {
        *self.failures.lock() += 1;
    }
}

/// Expected phase sequence of a finished run
fn full_order() -> Vec<Phase> {
    vec![Phase::Step(0), Phase::Step(1), Phase::Step(2), Phase::Results]
}

/// Check that `phases` is a prefix of the plan order
fn is_ordered_prefix(phases: &[Phase]) -> bool {
    let order = full_order();
    phases.len() <= order.len() && phases.iter().zip(&order).all(|(a, b)| a == b)
}

/// Tracks one run's snapshots and flags regressions
struct Monitor {
    scenario: u64,
    run: Option<RunId>,
    phase: Phase,
    ranks: Vec<u8>,
    samples: u64,
}

impl Monitor {
    fn new(scenario: u64) -> Self {
        Self {
            scenario,
            run: None,
            phase: Phase::Idle,
            ranks: Vec::new(),
            samples: 0,
        }
    }

    fn observe(
        &mut self,
        snapshot: &Snapshot<SearchQuery, FinderPayload>,
        violations: &mut Vec<Violation>,
    ) {
        self.samples += 1;
        let ranks: Vec<u8> = snapshot.results.iter().map(PhaseResult::rank).collect();

        if snapshot.run != self.run {
            self.run = snapshot.run;
            self.phase = snapshot.phase;
            self.ranks = ranks;
            return;
        }

        if snapshot.phase < self.phase {
            violations.push(Violation::PhaseRegressed {
                scenario: self.scenario,
                from: self.phase,
                to: snapshot.phase,
            });
        }
        for (index, (before, after)) in self.ranks.iter().zip(&ranks).enumerate() {
            if after < before {
                violations.push(Violation::ResultRegressed {
                    scenario: self.scenario,
                    index,
                });
            }
        }
        self.phase = snapshot.phase;
        self.ranks = ranks;
    }

    /// Sample until `limit` elapses or the run completes
    async fn watch(
        &mut self,
        finder: &PeopleFinder,
        limit: Duration,
        violations: &mut Vec<Violation>,
    ) -> Snapshot<SearchQuery, FinderPayload> {
        let start = Instant::now();
        loop {
            let snapshot = finder.sequencer().snapshot();
            self.observe(&snapshot, violations);
            if snapshot.complete || start.elapsed() >= limit {
                return snapshot;
            }
            sleep(SAMPLE_EVERY).await;
        }
    }
}

/// Pool of queries with their expected validity
fn query_pool() -> Vec<(SearchQuery, bool)> {
    vec![
        (SearchQuery::name("Jane", "Doe"), true),
        (SearchQuery::name("Ana", "Lima"), true),
        (SearchQuery::name("Kwame", "Mensah"), true),
        (SearchQuery::email("jane.doe@example.com"), true),
        (SearchQuery::email("k@mail.example.org"), true),
        (SearchQuery::phone("(312) 555-0100"), true),
        (SearchQuery::phone("+44 20 7946 0958"), true),
        (SearchQuery::name("Jane", " "), false),
        (SearchQuery::email("jane.example.com"), false),
        (SearchQuery::email("jane@localhost"), false),
        (SearchQuery::phone("555-01"), false),
        (SearchQuery::phone("call me"), false),
    ]
}

fn millis(rng: &mut StdRng, range: std::ops::Range<u64>) -> Duration {
    Duration::from_millis(rng.gen_range(range))
}

/// Generate a random scenario
fn generate_scenario(id: u64, rng: &mut StdRng, pool: &[(SearchQuery, bool)]) -> Scenario {
    let (query, valid) = pool[rng.gen_range(0..pool.len())].clone();
    let dwell = millis(rng, 5..30);
    let account_latency = millis(rng, 0..60);
    let record_latency = millis(rng, 0..60);
    let horizon = (dwell * 3 + account_latency + record_latency).as_millis();
    let horizon = u64::try_from(horizon).unwrap_or(u64::MAX).max(1);

    let action = match rng.gen_range(0..10) {
        0..=4 => Action::Complete,
        5 | 6 => Action::Teardown(millis(rng, 0..horizon)),
        7 | 8 => Action::Resubmit(millis(rng, 0..horizon)),
        _ => Action::Reset(millis(rng, 0..horizon)),
    };

    Scenario {
        id,
        query,
        valid,
        dwell,
        account_latency,
        record_latency,
        fail_accounts: rng.gen_bool(0.2),
        fail_records: rng.gen_bool(0.3),
        prefetch: rng.gen_bool(0.3),
        action,
    }
}

/// Run one scenario to the end
pub async fn run_scenario(scenario: Scenario) -> (SimulatorStats, Vec<Violation>) {
    let mut stats = SimulatorStats {
        runs: 1,
        ..SimulatorStats::default()
    };
    let mut violations = Vec::new();
    let id = scenario.id;

    let backend = Arc::new(
        DemoBackend::new()
            .with_latency(scenario.account_latency, scenario.record_latency)
            .with_failures(scenario.fail_accounts, scenario.fail_records),
    );
    let log = Arc::new(PhaseLog::default());
    let config = UnveilConfig::new()
        .with_dwell(scenario.dwell)
        .with_prefetch_public_records(scenario.prefetch);
    let finder = PeopleFinder::new(backend, &config, log.clone());

    let run = match finder.submit(scenario.query.clone()) {
        Ok(run) => {
            if !scenario.valid {
                violations.push(Violation::InvalidQueryAccepted { scenario: id });
            }
            run
        }
        Err(e) => {
            if scenario.valid {
                violations.push(Violation::ValidQueryRejected {
                    scenario: id,
                    error: e.to_string(),
                });
            } else {
                stats.rejected_queries += 1;
                sleep(scenario.dwell).await;
                if finder.phase() != Phase::Idle || log.len() > 0 {
                    violations.push(Violation::InvalidQueryAccepted { scenario: id });
                }
            }
            return (stats, violations);
        }
    };

    let mut monitor = Monitor::new(id);

    match scenario.action {
        Action::Complete => {
            let snapshot = monitor.watch(&finder, scenario.budget(), &mut violations).await;
            if snapshot.complete {
                stats.completed += 1;
                let phases = log.phases(run);
                if phases != full_order() {
                    violations.push(Violation::PhaseOrder { scenario: id, phases });
                }
            } else {
                violations.push(Violation::Incomplete {
                    scenario: id,
                    phase: snapshot.phase,
                });
            }
        }
        Action::Teardown(after) => {
            monitor.watch(&finder, after, &mut violations).await;
            finder.teardown();
            stats.torn_down += 1;

            let frozen = finder.sequencer().snapshot();
            let logged = log.len();
            sleep(scenario.quiet_period()).await;

            if finder.sequencer().snapshot() != frozen || log.len() != logged {
                violations.push(Violation::WriteAfterTeardown { scenario: id });
            }
            let phases = log.phases(run);
            if !is_ordered_prefix(&phases) {
                violations.push(Violation::PhaseOrder { scenario: id, phases });
            }
        }
        Action::Resubmit(after) => {
            monitor.watch(&finder, after, &mut violations).await;
            let Ok(second) = finder.submit(scenario.query.clone()) else {
                violations.push(Violation::ValidQueryRejected {
                    scenario: id,
                    error: "re-submit rejected".to_string(),
                });
                return (stats, violations);
            };
            stats.resubmitted += 1;

            let snapshot = monitor.watch(&finder, scenario.budget(), &mut violations).await;
            if snapshot.run != Some(second) {
                violations.push(Violation::StaleRunVisible { scenario: id });
            }
            if !snapshot.complete {
                violations.push(Violation::Incomplete {
                    scenario: id,
                    phase: snapshot.phase,
                });
            }
            let stale = log.phases(run);
            if !is_ordered_prefix(&stale) {
                violations.push(Violation::PhaseOrder {
                    scenario: id,
                    phases: stale,
                });
            }
            let phases = log.phases(second);
            if snapshot.complete && phases != full_order() {
                violations.push(Violation::PhaseOrder { scenario: id, phases });
            }
        }
        Action::Reset(after) => {
            monitor.watch(&finder, after, &mut violations).await;
            finder.reset();
            stats.reset += 1;
            sleep(scenario.quiet_period()).await;

            let snapshot = finder.sequencer().snapshot();
            if snapshot.run.is_some() || snapshot.phase != Phase::Idle {
                violations.push(Violation::StaleRunVisible { scenario: id });
            }
            let phases = log.phases(run);
            if !is_ordered_prefix(&phases) {
                violations.push(Violation::PhaseOrder { scenario: id, phases });
            }
        }
    }

    finder.teardown();
    stats.samples = monitor.samples;
    stats.lookup_failures = *log.failures.lock();
    (stats, violations)
}

/// Run the simulator
pub async fn run_simulator(config: SimulatorConfig) -> SimulatorReport {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let pool = query_pool();
    let scenarios: Vec<Scenario> = (0..config.runs)
        .map(|id| generate_scenario(id, &mut rng, &pool))
        .collect();

    let mut stats = SimulatorStats::default();
    let mut violations = Vec::new();

    for batch in scenarios.chunks(config.concurrency.max(1)) {
        let outcomes = join_all(batch.iter().cloned().map(run_scenario)).await;
        for (batch_stats, batch_violations) in outcomes {
            stats.merge(&batch_stats);
            violations.extend(batch_violations);
        }

        tracing::debug!(runs = stats.runs, violations = violations.len(), "Batch finished");
        if config.stop_on_first_violation && !violations.is_empty() {
            break;
        }
    }

    SimulatorReport {
        config,
        stats,
        violations,
    }
}
