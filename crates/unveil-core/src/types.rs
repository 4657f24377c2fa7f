//! Core types for Unveil
//!
//! Defines the data model shared by every controller:
//! - Run identifiers and submitted queries
//! - Phases and per-phase results
//! - Derived disclosure rows
//! - Validation state for debounced inputs

use crate::error::QueryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Unique run identifier (ULID for sortability)
///
/// One run is one submitted query driven through its phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Ulid);

impl RunId {
    /// Generate new run ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Input accepted by a phase sequencer
///
/// `validate` runs before anything starts; an error blocks the submission.
pub trait Submission: Clone + fmt::Debug + Send + Sync + 'static {
    /// Client-side validation
    fn validate(&self) -> Result<(), QueryError> {
        Ok(())
    }
}

/// People search query
///
/// Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchQuery {
    /// Search by full name
    Name {
        /// Given name
        first: String,
        /// Family name
        last: String,
    },
    /// Search by email address
    Email {
        /// Address as typed
        address: String,
    },
    /// Search by phone number
    Phone {
        /// Number as typed, separators allowed
        number: String,
    },
}

impl SearchQuery {
    /// Name query
    #[must_use]
    pub fn name(first: impl Into<String>, last: impl Into<String>) -> Self {
        Self::Name {
            first: first.into(),
            last: last.into(),
        }
    }

    /// Email query
    #[must_use]
    pub fn email(address: impl Into<String>) -> Self {
        Self::Email {
            address: address.into(),
        }
    }

    /// Phone query
    #[must_use]
    pub fn phone(number: impl Into<String>) -> Self {
        Self::Phone {
            number: number.into(),
        }
    }

    /// Short tag used in logs
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Name { .. } => "name",
            Self::Email { .. } => "email",
            Self::Phone { .. } => "phone",
        }
    }

    /// Digits of a phone query, separators removed
    #[must_use]
    pub fn phone_digits(number: &str) -> String {
        number.chars().filter(char::is_ascii_digit).collect()
    }
}

impl Submission for SearchQuery {
    fn validate(&self) -> Result<(), QueryError> {
        match self {
            Self::Name { first, last } => {
                if first.trim().is_empty() || last.trim().is_empty() {
                    return Err(QueryError::MissingName);
                }
                Ok(())
            }
            Self::Email { address } => validate_email(address),
            Self::Phone { number } => {
                if let Some(bad) = number
                    .chars()
                    .find(|c| !c.is_ascii_digit() && !" -().+".contains(*c))
                {
                    return Err(QueryError::InvalidPhoneCharacter(bad));
                }
                let digits = Self::phone_digits(number).len();
                if !(7..=15).contains(&digits) {
                    return Err(QueryError::MalformedPhone { digits });
                }
                Ok(())
            }
        }
    }
}

fn validate_email(address: &str) -> Result<(), QueryError> {
    let malformed = || QueryError::MalformedEmail(address.to_string());
    let address = address.trim();

    if address.chars().any(char::is_whitespace) {
        return Err(malformed());
    }

    let (local, domain) = address.split_once('@').ok_or_else(malformed)?;
    if local.is_empty() || domain.contains('@') {
        return Err(malformed());
    }

    let dotted = domain.split('.').collect::<Vec<_>>();
    if dotted.len() < 2 || dotted.iter().any(|label| label.is_empty()) {
        return Err(malformed());
    }

    Ok(())
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name { first, last } => write!(f, "{} {}", first.trim(), last.trim()),
            Self::Email { address } => write!(f, "{}", address.trim()),
            Self::Phone { number } => write!(f, "{}", number.trim()),
        }
    }
}

/// Position of a run in its phase list
///
/// Totally ordered: `Idle < Step(0) < Step(1) < … < Results`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// No run in progress
    Idle,
    /// Configured phase by index
    Step(usize),
    /// Terminal phase of a run
    Results,
}

impl Phase {
    /// Index of a configured phase
    #[inline]
    #[must_use]
    pub fn index(self) -> Option<usize> {
        match self {
            Self::Step(i) => Some(i),
            Self::Idle | Self::Results => None,
        }
    }

    /// Phase that follows this one in a plan of `len` phases
    #[must_use]
    pub fn next(self, len: usize) -> Self {
        match self {
            Self::Idle if len == 0 => Self::Results,
            Self::Idle => Self::Step(0),
            Self::Step(i) if i + 1 < len => Self::Step(i + 1),
            Self::Step(_) | Self::Results => Self::Results,
        }
    }

    /// Check if the run has finished
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Results)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Step(i) => write!(f, "phase {}", i + 1),
            Self::Results => write!(f, "results"),
        }
    }
}

/// Outcome slot for one phase
///
/// Moves forward only: `NotStarted → Pending → Succeeded | Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PhaseResult<P> {
    /// Lookup not dispatched yet
    #[default]
    NotStarted,
    /// Lookup in flight
    Pending,
    /// Lookup returned a payload
    Succeeded(P),
    /// Lookup failed with a reason
    Failed(String),
}

impl<P> PhaseResult<P> {
    /// Progress rank used to enforce forward-only transitions
    #[inline]
    #[must_use]
    pub fn rank(&self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::Pending => 1,
            Self::Succeeded(_) | Self::Failed(_) => 2,
        }
    }

    /// Check if the lookup has resolved (either way)
    #[inline]
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.rank() == 2
    }

    /// Payload of a successful lookup
    #[inline]
    #[must_use]
    pub fn payload(&self) -> Option<&P> {
        match self {
            Self::Succeeded(p) => Some(p),
            _ => None,
        }
    }

    /// Failure reason of a failed lookup
    #[inline]
    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl<P> From<Result<P, String>> for PhaseResult<P> {
    fn from(result: Result<P, String>) -> Self {
        match result {
            Ok(payload) => Self::Succeeded(payload),
            Err(reason) => Self::Failed(reason),
        }
    }
}

/// Payloads that can describe themselves in one line
pub trait Summarize {
    /// Detail line shown under the phase row
    fn summary(&self) -> String;
}

impl Summarize for () {
    fn summary(&self) -> String {
        String::new()
    }
}

/// Visual state of a disclosure row, ordered by progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    /// Not reached yet
    Upcoming,
    /// Current and unresolved (spinner)
    Active,
    /// Passed, or current and resolved
    Done,
}

impl RowStatus {
    /// Single-character marker for text output
    #[inline]
    #[must_use]
    pub fn marker(self) -> char {
        match self {
            Self::Upcoming => '·',
            Self::Active => '…',
            Self::Done => '✓',
        }
    }
}

/// One rendered row of the step list
///
/// Derived on every render; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosureRow {
    /// Phase label
    pub label: String,
    /// Visual state
    pub status: RowStatus,
    /// Summary of the phase result, if resolved
    pub detail: Option<String>,
}

impl fmt::Display for DisclosureRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status.marker(), self.label)?;
        if let Some(detail) = &self.detail {
            write!(f, " - {detail}")?;
        }
        Ok(())
    }
}

/// Tri-state result of a remote availability check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    /// No answer for the current value
    #[default]
    Unknown,
    /// Check in flight for the current value
    Checking,
    /// Remote reports the value as free
    Available,
    /// Remote reports the value as taken
    Unavailable,
}

/// Value and check status owned by one input field
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationState {
    /// Current input value
    pub value: String,
    /// Check status for exactly this value
    pub status: ValidationStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_total_order() {
        assert!(Phase::Idle < Phase::Step(0));
        assert!(Phase::Step(0) < Phase::Step(1));
        assert!(Phase::Step(41) < Phase::Results);
    }

    #[test]
    fn phase_next_walks_plan() {
        assert_eq!(Phase::Idle.next(2), Phase::Step(0));
        assert_eq!(Phase::Step(0).next(2), Phase::Step(1));
        assert_eq!(Phase::Step(1).next(2), Phase::Results);
        assert_eq!(Phase::Results.next(2), Phase::Results);
        assert_eq!(Phase::Idle.next(0), Phase::Results);
    }

    #[test]
    fn name_query_requires_both_parts() {
        assert!(SearchQuery::name("Jane", "Doe").validate().is_ok());
        assert_eq!(
            SearchQuery::name("Jane", "  ").validate(),
            Err(QueryError::MissingName)
        );
    }

    #[test]
    fn email_query_validation() {
        assert!(SearchQuery::email("jane@example.org").validate().is_ok());
        for bad in ["jane", "@example.org", "jane@example", "jane@@example.org", "ja ne@x.org", "jane@.org"] {
            assert!(
                matches!(SearchQuery::email(bad).validate(), Err(QueryError::MalformedEmail(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn phone_query_validation() {
        assert!(SearchQuery::phone("+1 (312) 555-0100").validate().is_ok());
        assert_eq!(
            SearchQuery::phone("555-01").validate(),
            Err(QueryError::MalformedPhone { digits: 5 })
        );
        assert_eq!(
            SearchQuery::phone("555-0100 x2").validate(),
            Err(QueryError::InvalidPhoneCharacter('x'))
        );
    }

    #[test]
    fn search_query_serializes_tagged() {
        let json = serde_json::to_value(SearchQuery::name("Jane", "Doe")).unwrap();
        assert_eq!(json["kind"], "name");
        assert_eq!(json["first"], "Jane");
    }

    #[test]
    fn phase_result_rank_and_accessors() {
        let ok: PhaseResult<u8> = Ok(3).into();
        let failed: PhaseResult<u8> = Err("boom".to_string()).into();
        assert!(ok.is_resolved());
        assert_eq!(ok.payload(), Some(&3));
        assert_eq!(failed.failure(), Some("boom"));
        assert!(PhaseResult::<u8>::Pending.rank() > PhaseResult::<u8>::NotStarted.rank());
    }

    #[test]
    fn row_display() {
        let row = DisclosureRow {
            label: "Checking for an account".into(),
            status: RowStatus::Done,
            detail: Some("No account found".into()),
        };
        assert_eq!(row.to_string(), "✓ Checking for an account - No account found");
    }
}
