//! Debounced remote validator
//!
//! Turns a rapidly changing input into at most one in-flight availability
//! check for the latest value. A change resets the status to `Unknown`
//! before anything else happens, cancels the pending timer and any in-flight
//! check, and schedules a new check after the debounce window.
//!
//! Responses are tagged with the change token they were issued for and are
//! dropped if the value has changed since.

use crate::backend::AvailabilityCheck;
use crate::config::ValidatorConfig;
use crate::notifier::Notifier;
use crate::types::{ValidationState, ValidationStatus};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

struct Slot {
    state: ValidationState,
    /// Incremented on every value change
    token: u64,
}

struct Inner {
    /// Cleared on teardown under the slot lock
    alive: AtomicBool,
    /// Set once the current value needs no further check; written under the slot lock
    settled: AtomicBool,
    slot: Mutex<Slot>,
    dispatches: AtomicUsize,
    state_tx: watch::Sender<ValidationState>,
    notifier: Arc<dyn Notifier>,
}

impl Inner {
    /// Publish the slot's state; caller holds the slot lock
    fn publish(&self, slot: &Slot) {
        self.state_tx.send_replace(slot.state.clone());
        self.notifier.validation_changed(&slot.state);
    }

    /// Set `status` if the controller is alive and `token` is current
    ///
    /// `last` marks the final write for `token`.
    fn apply(&self, token: u64, status: ValidationStatus, last: bool) -> bool {
        let mut slot = self.slot.lock();
        if !self.is_alive() || slot.token != token {
            debug!(token, current = slot.token, "Discarding stale validation result");
            return false;
        }
        slot.state.status = status;
        if last {
            self.settled.store(true, Ordering::Release);
        }
        self.publish(&slot);
        true
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Nothing left to wait for; read without the slot lock
    fn is_settled(&self) -> bool {
        !self.is_alive() || self.settled.load(Ordering::Acquire)
    }
}

/// Debounced availability checker for one input field
pub struct DebouncedValidator {
    checker: Arc<dyn AvailabilityCheck>,
    config: ValidatorConfig,
    inner: Arc<Inner>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl DebouncedValidator {
    /// Create a validator with an empty value
    ///
    /// `notifier` is called with the internal lock held.
    #[must_use]
    pub fn new(
        checker: Arc<dyn AvailabilityCheck>,
        config: ValidatorConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ValidationState::default());
        Self {
            checker,
            config,
            inner: Arc::new(Inner {
                alive: AtomicBool::new(true),
                settled: AtomicBool::new(true),
                slot: Mutex::new(Slot {
                    state: ValidationState::default(),
                    token: 0,
                }),
                dispatches: AtomicUsize::new(0),
                state_tx,
                notifier,
            }),
            pending: Mutex::new(None),
        }
    }

    /// Record a new input value
    ///
    /// Must be called from within a Tokio runtime.
    pub fn set_value(&self, value: impl Into<String>) {
        if !self.inner.is_alive() {
            return;
        }
        let value = value.into();
        let checks = value.trim().chars().count() >= self.config.min_length;

        if let Some(handle) = self.pending.lock().take() {
            handle.abort();
        }

        let token = {
            let mut slot = self.inner.slot.lock();
            if !self.inner.is_alive() {
                return;
            }
            slot.token += 1;
            slot.state = ValidationState {
                value: value.clone(),
                status: ValidationStatus::Unknown,
            };
            self.inner.settled.store(!checks, Ordering::Release);
            self.inner.publish(&slot);
            slot.token
        };

        if !checks {
            debug!(token, "Value below minimum length; not checking");
            return;
        }

        let inner = Arc::clone(&self.inner);
        let checker = Arc::clone(&self.checker);
        let debounce = self.config.debounce();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;

            if !inner.apply(token, ValidationStatus::Checking, false) {
                return;
            }
            inner.dispatches.fetch_add(1, Ordering::SeqCst);
            debug!(token, "Dispatching availability check");

            let status = match checker.check_availability(value.trim()).await {
                Ok(true) => ValidationStatus::Available,
                Ok(false) => ValidationStatus::Unavailable,
                Err(e) => {
                    warn!(token, error = %e, "Availability check failed");
                    ValidationStatus::Unknown
                }
            };

            inner.apply(token, status, true);
        });

        let mut pending = self.pending.lock();
        // Teardown clears liveness before it takes the pending slot.
        if !self.inner.is_alive() {
            handle.abort();
            return;
        }
        if self.inner.slot.lock().token != token {
            // A newer value already scheduled its own check.
            handle.abort();
            return;
        }
        if let Some(stale) = pending.replace(handle) {
            stale.abort();
        }
    }

    /// Current value and status
    #[must_use]
    pub fn state(&self) -> ValidationState {
        self.inner.slot.lock().state.clone()
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> ValidationStatus {
        self.inner.slot.lock().state.status
    }

    /// Whether the submit gate may proceed
    ///
    /// Only a definite `Unavailable` blocks; a broken or slow check never does.
    #[must_use]
    pub fn permits_submit(&self) -> bool {
        self.status() != ValidationStatus::Unavailable
    }

    /// Number of remote checks issued so far
    #[must_use]
    pub fn dispatch_count(&self) -> usize {
        self.inner.dispatches.load(Ordering::SeqCst)
    }

    /// Minimum value length that triggers a check
    #[inline]
    #[must_use]
    pub fn min_length(&self) -> usize {
        self.config.min_length
    }

    /// Receiver notified on every state change
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ValidationState> {
        self.inner.state_tx.subscribe()
    }

    /// Wait until the latest value needs no further check, then return the state
    ///
    /// Dropping the returned future leaves the scheduled check in place; it can
    /// still be cancelled by a new value or by [`teardown`](Self::teardown).
    pub async fn settle(&self) -> ValidationState {
        let mut rx = self.watch_state();
        let inner = Arc::clone(&self.inner);
        // The sender lives in `inner`, so the channel cannot close here.
        let _ = rx.wait_for(|_| inner.is_settled()).await;
        self.state()
    }

    /// Stop the validator; pending checks become no-ops
    pub fn teardown(&self) {
        {
            let _slot = self.inner.slot.lock();
            self.inner.alive.store(false, Ordering::Release);
        }
        if let Some(handle) = self.pending.lock().take() {
            handle.abort();
        }
        // Wake settle() callers.
        self.inner.state_tx.send_modify(|_| {});
    }
}

impl Drop for DebouncedValidator {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::notifier::NoopNotifier;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::time::sleep;

    #[derive(Default)]
    struct Taken {
        calls: Mutex<Vec<String>>,
        finished: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl AvailabilityCheck for Taken {
        async fn check_availability(&self, value: &str) -> Result<bool, BackendError> {
            self.calls.lock().push(value.to_string());
            sleep(Duration::from_millis(50)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(BackendError::Network("unreachable".into()));
            }
            Ok(value != "taken")
        }
    }

    fn validator(checker: Arc<Taken>) -> DebouncedValidator {
        DebouncedValidator::new(
            checker,
            ValidatorConfig::new(Duration::from_millis(300), 3),
            Arc::new(NoopNotifier),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn below_min_length_never_dispatches() {
        let checker = Arc::new(Taken::default());
        let v = validator(Arc::clone(&checker));

        v.set_value("ab");
        sleep(Duration::from_secs(2)).await;

        assert_eq!(v.dispatch_count(), 0);
        assert!(checker.calls.lock().is_empty());
        assert_eq!(v.status(), ValidationStatus::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_changes_dispatch_once_for_latest() {
        let checker = Arc::new(Taken::default());
        let v = validator(Arc::clone(&checker));

        v.set_value("abc");
        sleep(Duration::from_millis(100)).await;
        v.set_value("abcd");
        let state = v.settle().await;

        assert_eq!(*checker.calls.lock(), vec!["abcd".to_string()]);
        assert_eq!(state.value, "abcd");
        assert_eq!(state.status, ValidationStatus::Available);
    }

    #[tokio::test(start_paused = true)]
    async fn taken_value_blocks_submit() {
        let v = validator(Arc::new(Taken::default()));
        v.set_value("taken");
        let state = v.settle().await;

        assert_eq!(state.status, ValidationStatus::Unavailable);
        assert!(!v.permits_submit());
    }

    #[tokio::test(start_paused = true)]
    async fn change_resets_status_immediately() {
        let v = validator(Arc::new(Taken::default()));
        v.set_value("taken");
        v.settle().await;
        assert_eq!(v.status(), ValidationStatus::Unavailable);

        v.set_value("free-name");
        assert_eq!(v.status(), ValidationStatus::Unknown);
        assert!(v.permits_submit());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_fails_open() {
        let v = validator(Arc::new(Taken {
            fail: true,
            ..Taken::default()
        }));
        v.set_value("anything");
        let state = v.settle().await;

        assert_eq!(v.dispatch_count(), 1);
        assert_eq!(state.status, ValidationStatus::Unknown);
        assert!(v.permits_submit());
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_discards_in_flight_check() {
        let checker = Arc::new(Taken::default());
        let v = validator(Arc::clone(&checker));
        v.set_value("abcd");
        sleep(Duration::from_millis(320)).await;
        assert_eq!(v.status(), ValidationStatus::Checking);

        v.teardown();
        sleep(Duration::from_secs(1)).await;
        assert_eq!(v.status(), ValidationStatus::Checking);

        v.set_value("ignored");
        assert_eq!(v.state().value, "abcd");
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_settle_keeps_check_cancellable() {
        let checker = Arc::new(Taken::default());
        let v = validator(Arc::clone(&checker));
        v.set_value("abcd");
        sleep(Duration::from_millis(320)).await;
        assert_eq!(checker.calls.lock().len(), 1);

        let waited = tokio::time::timeout(Duration::from_millis(1), v.settle()).await;
        assert!(waited.is_err());

        v.teardown();
        sleep(Duration::from_secs(2)).await;
        assert_eq!(checker.finished.load(Ordering::SeqCst), 0);
        assert_eq!(v.status(), ValidationStatus::Checking);
    }

    #[tokio::test(start_paused = true)]
    async fn settle_returns_after_teardown() {
        let v = Arc::new(validator(Arc::new(Taken::default())));
        v.set_value("abcd");

        let waiter = tokio::spawn({
            let v = Arc::clone(&v);
            async move { v.settle().await }
        });
        sleep(Duration::from_millis(100)).await;
        v.teardown();

        let state = waiter.await.unwrap();
        assert_eq!(state.value, "abcd");
        assert_eq!(state.status, ValidationStatus::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn settle_is_immediate_without_a_check() {
        let v = validator(Arc::new(Taken::default()));
        assert_eq!(v.settle().await.status, ValidationStatus::Unknown);

        v.set_value("ab");
        assert_eq!(v.settle().await.value, "ab");
        assert_eq!(v.dispatch_count(), 0);
    }
}
