//! Side-effect capability injected into controllers
//!
//! Navigation, toasts and analytics pings are triggered through this trait so
//! the sequencing and rendering code stays free of direct calls.

use crate::types::{Phase, RunId, ValidationState};

/// Receiver of controller events
///
/// Every method defaults to a no-op; implement only what the use site needs.
/// Methods are called with the controller's state lock held: they must not
/// block and must not call back into the controller that issued them.
pub trait Notifier: Send + Sync {
    /// A run entered `phase`
    fn phase_entered(&self, _run: RunId, _phase: Phase) {}

    /// The lookup of phase `index` failed
    fn lookup_failed(&self, _run: RunId, _index: usize, _reason: &str) {}

    /// A run reached `Phase::Results`
    fn run_complete(&self, _run: RunId) {}

    /// A debounced validator changed state
    fn validation_changed(&self, _state: &ValidationState) {}
}

/// Notifier that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {}
