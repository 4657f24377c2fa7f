//! Backend collaborators
//!
//! Plain request/response calls the controllers depend on. Authentication,
//! rate limiting and persistence live behind these traits.

use crate::error::BackendError;
use crate::types::SearchQuery;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Remote availability check (usernames, tags)
#[async_trait]
pub trait AvailabilityCheck: Send + Sync {
    /// `true` when `value` is free to claim
    async fn check_availability(&self, value: &str) -> Result<bool, BackendError>;
}

/// People search lookups
#[async_trait]
pub trait PeopleSearchBackend: Send + Sync {
    /// Accounts on this platform matching the query
    async fn lookup_account_match(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<AccountMatch>, BackendError>;

    /// Public-record matches from the skip-tracing provider
    async fn lookup_public_records(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<PublicRecord>, BackendError>;
}

/// Profile persistence for onboarding
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Write the profile and return the authoritative post-write state
    async fn save_profile(&self, draft: &ProfileDraft) -> Result<ProfileState, BackendError>;
}

/// Account matching a people search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMatch {
    /// Account id
    pub user_id: String,
    /// Public handle
    pub username: String,
    /// Display name, if set
    #[serde(default)]
    pub display_name: Option<String>,
}

impl AccountMatch {
    /// Create account match
    #[must_use]
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            display_name: None,
        }
    }

    /// With display name
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Public-record match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicRecord {
    /// Full name on the record
    pub full_name: String,
    /// City, if known
    #[serde(default)]
    pub city: Option<String>,
    /// State or region, if known
    #[serde(default)]
    pub state: Option<String>,
    /// Age, if known
    #[serde(default)]
    pub age: Option<u16>,
}

impl PublicRecord {
    /// Create public record
    #[must_use]
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            city: None,
            state: None,
            age: None,
        }
    }

    /// With location
    #[must_use]
    pub fn with_location(mut self, city: impl Into<String>, state: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self.state = Some(state.into());
        self
    }

    /// With age
    #[must_use]
    pub fn with_age(mut self, age: u16) -> Self {
        self.age = Some(age);
        self
    }

    /// "City, ST" when any part is known
    #[must_use]
    pub fn location(&self) -> Option<String> {
        match (&self.city, &self.state) {
            (Some(city), Some(state)) => Some(format!("{city}, {state}")),
            (Some(place), None) | (None, Some(place)) => Some(place.clone()),
            (None, None) => None,
        }
    }
}

/// Profile fields collected by the onboarding wizard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileDraft {
    /// Account being onboarded
    pub user_id: String,
    /// Chosen handle
    pub username: String,
    /// Home pin latitude
    pub latitude: f64,
    /// Home pin longitude
    pub longitude: f64,
    /// Uploaded photo reference
    pub photo_url: String,
}

/// Authoritative profile state returned by a write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileState {
    /// Account id
    pub user_id: String,
    /// Stored handle
    pub username: String,
    /// Whether onboarding is recorded as complete
    pub onboarded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_location_formats() {
        let full = PublicRecord::new("Jane Doe").with_location("Chicago", "IL");
        assert_eq!(full.location().as_deref(), Some("Chicago, IL"));
        assert_eq!(PublicRecord::new("Jane Doe").location(), None);
    }

    #[test]
    fn account_match_decodes_without_display_name() {
        let m: AccountMatch =
            serde_json::from_str(r#"{"user_id":"u1","username":"jane"}"#).unwrap();
        assert_eq!(m, AccountMatch::new("u1", "jane"));
    }
}
