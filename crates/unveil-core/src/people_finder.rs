//! People finder
//!
//! "Looking up → checking for an account → searching public records →
//! results", configured on top of the generic [`PhaseSequencer`].

use crate::backend::{AccountMatch, PeopleSearchBackend, PublicRecord};
use crate::config::UnveilConfig;
use crate::error::{DisclosureError, LookupError};
use crate::notifier::Notifier;
use crate::plan::{PhaseLookup, PhasePlan, PhaseSpec};
use crate::sequencer::{PhaseSequencer, Snapshot};
use crate::types::{DisclosureRow, Phase, PhaseResult, RunId, SearchQuery, Summarize};
use async_trait::async_trait;
use std::sync::Arc;

/// Index of the pacing phase
pub const PHASE_LOOKING: usize = 0;
/// Index of the account-match phase
pub const PHASE_ACCOUNTS: usize = 1;
/// Index of the public-record phase
pub const PHASE_RECORDS: usize = 2;

/// Names listed in a detail line before " and N more"
const LISTED: usize = 3;

/// Payload of a people finder phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinderPayload {
    /// Platform accounts
    Accounts(Vec<AccountMatch>),
    /// Public-record matches
    Records(Vec<PublicRecord>),
}

impl Summarize for FinderPayload {
    fn summary(&self) -> String {
        match self {
            Self::Accounts(matches) if matches.is_empty() => "No account found".to_string(),
            Self::Accounts(matches) => {
                let names = matches.iter().map(|m| format!("@{}", m.username));
                count_line(matches.len(), "account", "accounts", names)
            }
            Self::Records(records) if records.is_empty() => "No public records found".to_string(),
            Self::Records(records) => {
                let names = records.iter().map(|r| match r.location() {
                    Some(place) => format!("{} ({place})", r.full_name),
                    None => r.full_name.clone(),
                });
                count_line(records.len(), "public record", "public records", names)
            }
        }
    }
}

fn count_line(
    count: usize,
    singular: &str,
    plural: &str,
    names: impl Iterator<Item = String>,
) -> String {
    let noun = if count == 1 { singular } else { plural };
    let listed = names.take(LISTED).collect::<Vec<_>>().join(", ");
    let mut line = format!("{count} {noun} found: {listed}");
    if count > LISTED {
        line.push_str(&format!(" and {} more", count - LISTED));
    }
    line
}

struct AccountLookup {
    backend: Arc<dyn PeopleSearchBackend>,
}

#[async_trait]
impl PhaseLookup<SearchQuery, FinderPayload> for AccountLookup {
    async fn lookup(&self, query: &SearchQuery) -> Result<FinderPayload, LookupError> {
        let matches = self.backend.lookup_account_match(query).await?;
        Ok(FinderPayload::Accounts(matches))
    }
}

struct RecordLookup {
    backend: Arc<dyn PeopleSearchBackend>,
}

#[async_trait]
impl PhaseLookup<SearchQuery, FinderPayload> for RecordLookup {
    async fn lookup(&self, query: &SearchQuery) -> Result<FinderPayload, LookupError> {
        let records = self.backend.lookup_public_records(query).await?;
        Ok(FinderPayload::Records(records))
    }
}

/// Phase plan of the people finder
#[must_use]
pub fn people_finder_plan(
    backend: Arc<dyn PeopleSearchBackend>,
    config: &UnveilConfig,
) -> PhasePlan<SearchQuery, FinderPayload> {
    let records = PhaseSpec::new("Searching public records").with_lookup(Arc::new(RecordLookup {
        backend: Arc::clone(&backend),
    }));
    let records = if config.people.prefetch_public_records {
        records.prefetch()
    } else {
        records
    };

    PhasePlan::new(config.dwell())
        .with_phase(PhaseSpec::new("Looking up person"))
        .with_phase(
            PhaseSpec::new("Checking for an account")
                .with_lookup(Arc::new(AccountLookup { backend })),
        )
        .with_phase(records)
}

/// Results gathered so far, in one place
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FinderSummary {
    /// Account matches, once the lookup succeeded
    pub accounts: Option<Vec<AccountMatch>>,
    /// Public records, once the lookup succeeded
    pub records: Option<Vec<PublicRecord>>,
    /// Account lookup failure
    pub account_error: Option<String>,
    /// Public-record lookup failure
    pub record_error: Option<String>,
    /// Set once the run reached results
    pub search_complete: bool,
}

impl FinderSummary {
    fn from_snapshot(snapshot: &Snapshot<SearchQuery, FinderPayload>) -> Self {
        let mut summary = Self {
            search_complete: snapshot.complete,
            ..Self::default()
        };

        for (index, slot) in snapshot.results.iter().enumerate() {
            match (index, slot) {
                (_, PhaseResult::Succeeded(FinderPayload::Accounts(m))) => {
                    summary.accounts = Some(m.clone());
                }
                (_, PhaseResult::Succeeded(FinderPayload::Records(r))) => {
                    summary.records = Some(r.clone());
                }
                (PHASE_ACCOUNTS, PhaseResult::Failed(reason)) => {
                    summary.account_error = Some(reason.clone());
                }
                (PHASE_RECORDS, PhaseResult::Failed(reason)) => {
                    summary.record_error = Some(reason.clone());
                }
                _ => {}
            }
        }
        summary
    }

    /// Total matches across both sources
    #[must_use]
    pub fn total_matches(&self) -> usize {
        self.accounts.as_ref().map_or(0, Vec::len) + self.records.as_ref().map_or(0, Vec::len)
    }
}

/// People finder controller
pub struct PeopleFinder {
    sequencer: PhaseSequencer<SearchQuery, FinderPayload>,
}

impl PeopleFinder {
    /// Create an idle finder
    #[must_use]
    pub fn new(
        backend: Arc<dyn PeopleSearchBackend>,
        config: &UnveilConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            sequencer: PhaseSequencer::new(people_finder_plan(backend, config), notifier),
        }
    }

    /// Start a search
    ///
    /// # Errors
    /// See [`PhaseSequencer::submit`]
    pub fn submit(&self, query: SearchQuery) -> Result<RunId, DisclosureError> {
        tracing::info!(kind = query.kind(), "People search submitted");
        self.sequencer.submit(query)
    }

    /// Abandon the current search
    pub fn reset(&self) {
        self.sequencer.reset();
    }

    /// Stop the finder for good
    pub fn teardown(&self) {
        self.sequencer.teardown();
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.sequencer.phase()
    }

    /// Rendered step list
    #[must_use]
    pub fn rows(&self) -> Vec<DisclosureRow> {
        self.sequencer.rows()
    }

    /// Results gathered so far
    #[must_use]
    pub fn summary(&self) -> FinderSummary {
        FinderSummary::from_snapshot(&self.sequencer.snapshot())
    }

    /// Wait for the search to finish
    ///
    /// # Errors
    /// `DisclosureError::TornDown` if the finder is torn down first
    pub async fn wait_until_complete(&self) -> Result<FinderSummary, DisclosureError> {
        let snapshot = self.sequencer.wait_until_complete().await?;
        Ok(FinderSummary::from_snapshot(&snapshot))
    }

    /// Underlying sequencer
    #[inline]
    #[must_use]
    pub fn sequencer(&self) -> &PhaseSequencer<SearchQuery, FinderPayload> {
        &self.sequencer
    }
}
