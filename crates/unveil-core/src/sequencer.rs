//! Phase sequencer
//!
//! Drives one submitted query through a [`PhasePlan`]:
//!
//! ```text
//! Idle → Step(0) → Step(1) → … → Step(n-1) → Results
//! ```
//!
//! Leaving a phase requires both the plan's dwell time and, when the phase has
//! a lookup, that lookup's resolution. Lookup failures are recorded in the
//! phase's slot and the run keeps going.
//!
//! # Stale writes
//!
//! Every write is tagged with the [`RunId`] that produced it and is applied
//! only while the controller is alive and that run is still current. A reset,
//! a re-submit or a teardown therefore turns every pending timer and in-flight
//! lookup of the old run into a no-op.
//!
//! Notifications are issued under the state lock together with the write they
//! describe, so none can arrive once [`PhaseSequencer::teardown`] returns.

use crate::accumulator::{Change, ResultSet};
use crate::error::DisclosureError;
use crate::notifier::Notifier;
use crate::plan::{Dispatch, PhaseLookup, PhasePlan};
use crate::render::render;
use crate::types::{DisclosureRow, Phase, RunId, Submission, Summarize};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Copy of a controller's state at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<Q, P> {
    /// Current run, if any
    pub run: Option<RunId>,
    /// Query of the current run
    pub query: Option<Q>,
    /// Current phase
    pub phase: Phase,
    /// Per-phase results of the current run
    pub results: ResultSet<P>,
    /// Set once the run reached `Phase::Results`
    pub complete: bool,
}

/// Mutable state of the current run
#[derive(Debug)]
struct RunState<Q, P> {
    run: Option<RunId>,
    query: Option<Q>,
    phase: Phase,
    results: ResultSet<P>,
    /// Per-run dispatch guard, one flag per phase
    dispatched: Vec<bool>,
    complete: bool,
}

impl<Q: Clone, P: Clone + PartialEq> RunState<Q, P> {
    fn idle(len: usize) -> Self {
        Self {
            run: None,
            query: None,
            phase: Phase::Idle,
            results: ResultSet::new(len),
            dispatched: vec![false; len],
            complete: false,
        }
    }

    fn snapshot(&self) -> Snapshot<Q, P> {
        Snapshot {
            run: self.run,
            query: self.query.clone(),
            phase: self.phase,
            results: self.results.clone(),
            complete: self.complete,
        }
    }
}

/// State shared between the controller, its driver and its lookups
struct Shared<Q, P> {
    /// Cleared on teardown under the state lock; bound to the controller, not the run
    alive: AtomicBool,
    state: Mutex<RunState<Q, P>>,
    phase_tx: watch::Sender<Phase>,
    notifier: Arc<dyn Notifier>,
}

impl<Q: Clone, P: Clone + PartialEq> Shared<Q, P> {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Apply `f` if the controller is alive and `run` is current
    fn write<R>(&self, run: RunId, f: impl FnOnce(&mut RunState<Q, P>) -> R) -> Option<R> {
        let mut state = self.state.lock();
        if !self.is_alive() {
            debug!(run = %run, "Discarding write after teardown");
            return None;
        }
        if state.run != Some(run) {
            debug!(run = %run, "Discarding write from stale run");
            return None;
        }
        Some(f(&mut state))
    }

    fn enter(&self, run: RunId, phase: Phase) -> bool {
        self.write(run, |state| {
            state.phase = phase;
            self.phase_tx.send_replace(phase);
            self.notifier.phase_entered(run, phase);
            if phase.is_terminal() {
                state.complete = true;
                self.notifier.run_complete(run);
            }
        })
        .is_some()
    }

    /// Claim phase `index` for dispatch; false if already claimed
    fn claim(&self, run: RunId, index: usize) -> bool {
        self.write(run, |state| {
            match state.dispatched.get_mut(index) {
                Some(flag) if !*flag => *flag = true,
                _ => return false,
            }
            state.results.begin(index);
            true
        })
        .unwrap_or(false)
    }

    fn resolve(&self, run: RunId, index: usize, outcome: Result<P, String>) -> Option<Change> {
        self.write(run, |state| {
            let failure = outcome.as_ref().err().cloned();
            let change = state.results.resolve(index, outcome);
            if let (Change::Applied, Some(reason)) = (change, failure) {
                warn!(run = %run, index, reason = %reason, "Lookup failed");
                self.notifier.lookup_failed(run, index, &reason);
            }
            change
        })
    }
}

/// Generic multi-phase controller
///
/// Owns at most one run at a time. Must be used from within a Tokio runtime.
pub struct PhaseSequencer<Q, P> {
    plan: Arc<PhasePlan<Q, P>>,
    shared: Arc<Shared<Q, P>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl<Q, P> PhaseSequencer<Q, P>
where
    Q: Submission,
    P: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create an idle controller for `plan`
    ///
    /// `notifier` is called with the state lock held and must not call back
    /// into this controller.
    #[must_use]
    pub fn new(plan: PhasePlan<Q, P>, notifier: Arc<dyn Notifier>) -> Self {
        let (phase_tx, _) = watch::channel(Phase::Idle);
        let len = plan.len();
        Self {
            plan: Arc::new(plan),
            shared: Arc::new(Shared {
                alive: AtomicBool::new(true),
                state: Mutex::new(RunState::idle(len)),
                phase_tx,
                notifier,
            }),
            driver: Mutex::new(None),
        }
    }

    /// Start a new run for `query`
    ///
    /// Any run in progress is reset to `Idle` first; its pending writes are
    /// discarded.
    ///
    /// # Errors
    /// - `DisclosureError::InvalidQuery` if client-side validation fails
    /// - `DisclosureError::TornDown` after [`teardown`](Self::teardown)
    pub fn submit(&self, query: Q) -> Result<RunId, DisclosureError> {
        if !self.shared.is_alive() {
            return Err(DisclosureError::TornDown);
        }
        query.validate()?;

        let run = RunId::new();
        {
            let mut driver = self.driver.lock();
            if let Some(handle) = driver.take() {
                handle.abort();
            }

            let mut state = self.shared.state.lock();
            if !self.shared.is_alive() {
                return Err(DisclosureError::TornDown);
            }
            if let Some(previous) = state.run {
                debug!(run = %previous, phase = %state.phase, "Replacing run");
            }
            *state = RunState::idle(self.plan.len());
            state.run = Some(run);
            state.query = Some(query.clone());
            self.shared.phase_tx.send_replace(Phase::Idle);
        }
        info!(run = %run, phases = self.plan.len(), "Run submitted");

        let handle = tokio::spawn(drive(
            Arc::clone(&self.plan),
            Arc::clone(&self.shared),
            run,
            query,
        ));

        let mut driver = self.driver.lock();
        // Teardown clears liveness before it takes the driver slot.
        if !self.shared.is_alive() {
            handle.abort();
            return Err(DisclosureError::TornDown);
        }
        if self.shared.state.lock().run != Some(run) {
            // A concurrent submit already replaced this run.
            handle.abort();
            return Ok(run);
        }
        if let Some(stale) = driver.replace(handle) {
            stale.abort();
        }

        Ok(run)
    }

    /// Abandon the current run and return to `Idle`
    ///
    /// No-op after [`teardown`](Self::teardown).
    pub fn reset(&self) {
        let mut driver = self.driver.lock();
        let mut state = self.shared.state.lock();
        if !self.shared.is_alive() {
            return;
        }
        if let Some(handle) = driver.take() {
            handle.abort();
        }
        if let Some(run) = state.run {
            debug!(run = %run, phase = %state.phase, "Resetting run");
        }
        *state = RunState::idle(self.plan.len());
        self.shared.phase_tx.send_replace(Phase::Idle);
    }

    /// Stop the controller for good
    ///
    /// Timers are cancelled and late lookup completions become no-ops.
    pub fn teardown(&self) {
        {
            // Serialise with in-flight writes and their notifications.
            let _state = self.shared.state.lock();
            if !self.shared.alive.swap(false, Ordering::AcqRel) {
                return;
            }
        }
        if let Some(handle) = self.driver.lock().take() {
            handle.abort();
        }
        debug!("Sequencer torn down");
        // Wake waiters so they observe the teardown.
        self.shared.phase_tx.send_modify(|_| {});
    }

    /// Check if the controller still accepts work
    #[inline]
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.shared.is_alive()
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.shared.state.lock().phase
    }

    /// Check if the current run reached `Results`
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.shared.state.lock().complete
    }

    /// Copy of the current state
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<Q, P> {
        self.shared.state.lock().snapshot()
    }

    /// Phase list of this controller
    #[inline]
    #[must_use]
    pub fn plan(&self) -> &PhasePlan<Q, P> {
        &self.plan
    }

    /// Receiver notified on every phase change
    #[must_use]
    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.shared.phase_tx.subscribe()
    }

    /// Wait until the current run reaches `Results`
    ///
    /// # Errors
    /// `DisclosureError::TornDown` if the controller is torn down first
    pub async fn wait_until_complete(&self) -> Result<Snapshot<Q, P>, DisclosureError> {
        let mut rx = self.watch_phase();
        let shared = Arc::clone(&self.shared);
        // The sender lives in `shared`, so the channel cannot close here.
        let _ = rx
            .wait_for(|phase| phase.is_terminal() || !shared.is_alive())
            .await;

        if !self.is_alive() {
            return Err(DisclosureError::TornDown);
        }
        Ok(self.snapshot())
    }
}

impl<Q, P> PhaseSequencer<Q, P>
where
    Q: Submission,
    P: Summarize + Clone + PartialEq + Send + Sync + 'static,
{
    /// Rendered step list for the current state
    #[must_use]
    pub fn rows(&self) -> Vec<DisclosureRow> {
        let state = self.shared.state.lock();
        render(&self.plan.labels(), state.phase, &state.results)
    }
}

impl<Q, P> Drop for PhaseSequencer<Q, P> {
    fn drop(&mut self) {
        self.shared.alive.store(false, Ordering::Release);
        if let Some(handle) = self.driver.get_mut().take() {
            handle.abort();
        }
    }
}

/// Walk the plan for one run
async fn drive<Q, P>(
    plan: Arc<PhasePlan<Q, P>>,
    shared: Arc<Shared<Q, P>>,
    run: RunId,
    query: Q,
) where
    Q: Submission,
    P: Clone + PartialEq + Send + Sync + 'static,
{
    let mut lookups: Vec<Option<JoinHandle<()>>> = (0..plan.len()).map(|_| None).collect();

    for (index, spec) in plan.iter().enumerate() {
        if spec.dispatch() == Dispatch::OnSubmit {
            if let Some(lookup) = spec.lookup() {
                lookups[index] = dispatch(&shared, run, index, lookup, &query);
            }
        }
    }

    let mut phase = Phase::Idle.next(plan.len());
    while let Some(index) = phase.index() {
        let Some(spec) = plan.get(index) else {
            phase = Phase::Results;
            break;
        };
        if !shared.enter(run, phase) {
            return;
        }
        debug!(run = %run, phase = %phase, label = spec.label(), "Entered phase");

        if spec.dispatch() == Dispatch::OnEnter {
            if let Some(lookup) = spec.lookup() {
                lookups[index] = dispatch(&shared, run, index, lookup, &query);
            }
        }

        let pending = lookups[index].take();
        let resolution = async {
            if let Some(handle) = pending {
                if let Err(e) = handle.await {
                    warn!(run = %run, index, error = %e, "Lookup task ended without a result");
                    shared.resolve(run, index, Err("lookup abandoned".to_string()));
                }
            }
        };
        tokio::join!(tokio::time::sleep(plan.dwell()), resolution);
        phase = phase.next(plan.len());
    }

    if shared.enter(run, phase) {
        info!(run = %run, "Run complete");
    }
}

/// Fire the lookup of phase `index` unless it was already fired for `run`
fn dispatch<Q, P>(
    shared: &Arc<Shared<Q, P>>,
    run: RunId,
    index: usize,
    lookup: &Arc<dyn PhaseLookup<Q, P>>,
    query: &Q,
) -> Option<JoinHandle<()>>
where
    Q: Submission,
    P: Clone + PartialEq + Send + Sync + 'static,
{
    if !shared.claim(run, index) {
        debug!(run = %run, index, "Lookup already dispatched");
        return None;
    }
    debug!(run = %run, index, "Dispatching lookup");

    let shared = Arc::clone(shared);
    let lookup = Arc::clone(lookup);
    let query = query.clone();

    Some(tokio::spawn(async move {
        let outcome = lookup.lookup(&query).await.map_err(|e| e.reason());
        match shared.resolve(run, index, outcome) {
            Some(Change::Applied) => debug!(run = %run, index, "Lookup resolved"),
            Some(change) => debug!(run = %run, index, ?change, "Lookup result not applied"),
            None => {}
        }
    }))
}
