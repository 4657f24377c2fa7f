//! Phase plans
//!
//! A plan is the per-use-site configuration of the generic sequencer: an
//! ordered phase list, one optional async lookup per phase, and the dwell time
//! shared by every phase.

use crate::error::LookupError;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Async lookup attached to a phase
#[async_trait]
pub trait PhaseLookup<Q, P>: Send + Sync {
    /// Run the lookup for `query`
    async fn lookup(&self, query: &Q) -> Result<P, LookupError>;
}

/// Adapter turning an async closure into a [`PhaseLookup`]
pub struct FnLookup<F> {
    f: F,
}

impl<F> FnLookup<F> {
    /// Wrap `f`; it receives an owned copy of the query
    #[inline]
    #[must_use]
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<Q, P, F, Fut> PhaseLookup<Q, P> for FnLookup<F>
where
    Q: Clone + Send + Sync + 'static,
    P: Send + 'static,
    F: Fn(Q) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<P, LookupError>> + Send + 'static,
{
    async fn lookup(&self, query: &Q) -> Result<P, LookupError> {
        (self.f)(query.clone()).await
    }
}

/// When a phase's lookup is fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dispatch {
    /// When the phase becomes current
    #[default]
    OnEnter,
    /// At submit, overlapping earlier phases
    OnSubmit,
}

/// One configured phase
pub struct PhaseSpec<Q, P> {
    label: String,
    lookup: Option<Arc<dyn PhaseLookup<Q, P>>>,
    dispatch: Dispatch,
}

impl<Q, P> PhaseSpec<Q, P> {
    /// Phase with no lookup; it only dwells
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            lookup: None,
            dispatch: Dispatch::OnEnter,
        }
    }

    /// With lookup
    #[must_use]
    pub fn with_lookup(mut self, lookup: Arc<dyn PhaseLookup<Q, P>>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// With lookup from an async closure
    #[must_use]
    pub fn with_fn<F, Fut>(self, f: F) -> Self
    where
        Q: Clone + Send + Sync + 'static,
        P: Send + 'static,
        F: Fn(Q) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<P, LookupError>> + Send + 'static,
    {
        self.with_lookup(Arc::new(FnLookup::new(f)))
    }

    /// Fire the lookup at submit instead of on entry
    #[must_use]
    pub fn prefetch(mut self) -> Self {
        self.dispatch = Dispatch::OnSubmit;
        self
    }

    /// Row label
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Attached lookup
    #[inline]
    #[must_use]
    pub fn lookup(&self) -> Option<&Arc<dyn PhaseLookup<Q, P>>> {
        self.lookup.as_ref()
    }

    /// Dispatch policy
    #[inline]
    #[must_use]
    pub fn dispatch(&self) -> Dispatch {
        self.dispatch
    }
}

impl<Q, P> fmt::Debug for PhaseSpec<Q, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseSpec")
            .field("label", &self.label)
            .field("has_lookup", &self.lookup.is_some())
            .field("dispatch", &self.dispatch)
            .finish()
    }
}

/// Ordered phase list with a shared dwell time
#[derive(Debug)]
pub struct PhasePlan<Q, P> {
    phases: Vec<PhaseSpec<Q, P>>,
    dwell: Duration,
}

impl<Q, P> PhasePlan<Q, P> {
    /// Empty plan
    #[must_use]
    pub fn new(dwell: Duration) -> Self {
        Self {
            phases: Vec::new(),
            dwell,
        }
    }

    /// Append a phase
    #[must_use]
    pub fn with_phase(mut self, phase: PhaseSpec<Q, P>) -> Self {
        self.phases.push(phase);
        self
    }

    /// Minimum time spent in each phase
    #[inline]
    #[must_use]
    pub fn dwell(&self) -> Duration {
        self.dwell
    }

    /// Number of phases
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// Check if the plan has no phases
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Phase by index
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&PhaseSpec<Q, P>> {
        self.phases.get(index)
    }

    /// Phases in order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &PhaseSpec<Q, P>> {
        self.phases.iter()
    }

    /// Row labels in order
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.phases.iter().map(PhaseSpec::label).collect()
    }
}
