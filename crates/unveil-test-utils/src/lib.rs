//! Testing utilities for the Unveil workspace
//!
//! Scripted collaborators with call recording, and a notifier that keeps
//! every event it receives.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use unveil_core::{
    AccountMatch, AvailabilityCheck, BackendError, Notifier, PeopleSearchBackend, Phase,
    ProfileDraft, ProfileState, ProfileStore, PublicRecord, RunId, SearchQuery, UnveilConfig,
    ValidationState, ValidatorConfig,
};

/// Configuration with short, round timings for paused-clock tests
pub fn test_config() -> UnveilConfig {
    UnveilConfig::new()
        .with_dwell(Duration::from_millis(800))
        .with_validator(ValidatorConfig::new(Duration::from_millis(400), 3))
}

/// Scripted response of one lookup
#[derive(Debug, Clone)]
pub struct Script<T> {
    pub delay: Duration,
    pub response: Result<T, BackendError>,
}

impl<T> Script<T> {
    pub fn ok(response: T, delay: Duration) -> Self {
        Self {
            delay,
            response: Ok(response),
        }
    }

    pub fn err(error: BackendError, delay: Duration) -> Self {
        Self {
            delay,
            response: Err(error),
        }
    }
}

/// People search backend answering from scripts
#[derive(Debug)]
pub struct ScriptedPeopleBackend {
    accounts: Script<Vec<AccountMatch>>,
    records: Script<Vec<PublicRecord>>,
    account_calls: Mutex<Vec<SearchQuery>>,
    record_calls: Mutex<Vec<SearchQuery>>,
}

impl ScriptedPeopleBackend {
    pub fn new(accounts: Script<Vec<AccountMatch>>, records: Script<Vec<PublicRecord>>) -> Self {
        Self {
            accounts,
            records,
            account_calls: Mutex::new(Vec::new()),
            record_calls: Mutex::new(Vec::new()),
        }
    }

    /// Both lookups succeed with empty lists after `delay`
    pub fn empty(delay: Duration) -> Self {
        Self::new(Script::ok(Vec::new(), delay), Script::ok(Vec::new(), delay))
    }

    pub fn account_calls(&self) -> Vec<SearchQuery> {
        self.account_calls.lock().clone()
    }

    pub fn record_calls(&self) -> Vec<SearchQuery> {
        self.record_calls.lock().clone()
    }
}

#[async_trait]
impl PeopleSearchBackend for ScriptedPeopleBackend {
    async fn lookup_account_match(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<AccountMatch>, BackendError> {
        self.account_calls.lock().push(query.clone());
        sleep(self.accounts.delay).await;
        self.accounts.response.clone()
    }

    async fn lookup_public_records(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<PublicRecord>, BackendError> {
        self.record_calls.lock().push(query.clone());
        sleep(self.records.delay).await;
        self.records.response.clone()
    }
}

/// Availability check with a fixed set of taken values
#[derive(Debug, Default)]
pub struct ScriptedAvailability {
    taken: HashSet<String>,
    delay: Duration,
    failing: bool,
    calls: Mutex<Vec<String>>,
}

impl ScriptedAvailability {
    pub fn new<I, S>(taken: I, delay: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            taken: taken.into_iter().map(Into::into).collect(),
            delay,
            ..Self::default()
        }
    }

    /// Every check fails with a network error
    pub fn failing(delay: Duration) -> Self {
        Self {
            delay,
            failing: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl AvailabilityCheck for ScriptedAvailability {
    async fn check_availability(&self, value: &str) -> Result<bool, BackendError> {
        self.calls.lock().push(value.to_string());
        sleep(self.delay).await;
        if self.failing {
            return Err(BackendError::Network("connection refused".to_string()));
        }
        Ok(!self.taken.contains(value))
    }
}

/// Profile store that records drafts and reports a scripted onboarded flag
#[derive(Debug)]
pub struct RecordingProfileStore {
    onboarded: bool,
    delay: Duration,
    saved: Mutex<Vec<ProfileDraft>>,
}

impl RecordingProfileStore {
    pub fn new(onboarded: bool, delay: Duration) -> Self {
        Self {
            onboarded,
            delay,
            saved: Mutex::new(Vec::new()),
        }
    }

    pub fn saved(&self) -> Vec<ProfileDraft> {
        self.saved.lock().clone()
    }
}

#[async_trait]
impl ProfileStore for RecordingProfileStore {
    async fn save_profile(&self, draft: &ProfileDraft) -> Result<ProfileState, BackendError> {
        self.saved.lock().push(draft.clone());
        sleep(self.delay).await;
        Ok(ProfileState {
            user_id: draft.user_id.clone(),
            username: draft.username.clone(),
            onboarded: self.onboarded,
        })
    }
}

/// Event captured by [`RecordingNotifier`]
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    PhaseEntered(RunId, Phase),
    LookupFailed(RunId, usize, String),
    RunComplete(RunId),
    Validation(ValidationState),
}

/// Notifier that keeps every event
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<Event>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Phases entered by `run`, in order
    pub fn phases(&self, run: RunId) -> Vec<Phase> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::PhaseEntered(r, phase) if *r == run => Some(*phase),
                _ => None,
            })
            .collect()
    }

    /// Failures reported for `run`
    pub fn failures(&self, run: RunId) -> Vec<(usize, String)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::LookupFailed(r, index, reason) if *r == run => {
                    Some((*index, reason.clone()))
                }
                _ => None,
            })
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn phase_entered(&self, run: RunId, phase: Phase) {
        self.events.lock().push(Event::PhaseEntered(run, phase));
    }

    fn lookup_failed(&self, run: RunId, index: usize, reason: &str) {
        self.events
            .lock()
            .push(Event::LookupFailed(run, index, reason.to_string()));
    }

    fn run_complete(&self, run: RunId) {
        self.events.lock().push(Event::RunComplete(run));
    }

    fn validation_changed(&self, state: &ValidationState) {
        self.events.lock().push(Event::Validation(state.clone()));
    }
}
