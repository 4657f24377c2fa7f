//! Offline backend used when no base URL is configured
//!
//! Answers are derived from the query text so repeated searches agree.

use async_trait::async_trait;
use std::time::Duration;
use unveil_core::{
    AccountMatch, AvailabilityCheck, BackendError, PeopleSearchBackend, PublicRecord, SearchQuery,
};

const RESERVED: &[&str] = &["admin", "root", "support", "unveil"];

const PLACES: &[(&str, &str)] = &[
    ("Chicago", "IL"),
    ("Austin", "TX"),
    ("Portland", "OR"),
    ("Raleigh", "NC"),
];

/// Deterministic in-process collaborator
#[derive(Debug, Clone)]
pub struct DemoBackend {
    account_latency: Duration,
    record_latency: Duration,
    fail_accounts: bool,
    fail_records: bool,
}

impl Default for DemoBackend {
    fn default() -> Self {
        Self {
            account_latency: Duration::from_millis(350),
            record_latency: Duration::from_millis(1_200),
            fail_accounts: false,
            fail_records: false,
        }
    }
}

impl DemoBackend {
    /// Backend with default latencies
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With per-lookup latencies
    #[inline]
    #[must_use]
    pub fn with_latency(mut self, accounts: Duration, records: Duration) -> Self {
        self.account_latency = accounts;
        self.record_latency = records;
        self
    }

    /// With scripted failures
    #[inline]
    #[must_use]
    pub fn with_failures(mut self, accounts: bool, records: bool) -> Self {
        self.fail_accounts = accounts;
        self.fail_records = records;
        self
    }
}

fn seed_of(text: &str) -> usize {
    text.bytes().map(usize::from).sum()
}

/// Lower-cased handle derived from the query
fn handle_of(query: &SearchQuery) -> String {
    match query {
        SearchQuery::Name { first, last } => format!("{}{}", first.trim(), last.trim()),
        SearchQuery::Email { address } => address.split('@').next().unwrap_or_default().to_string(),
        SearchQuery::Phone { number } => format!("user{}", SearchQuery::phone_digits(number)),
    }
    .to_lowercase()
}

#[async_trait]
impl PeopleSearchBackend for DemoBackend {
    async fn lookup_account_match(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<AccountMatch>, BackendError> {
        tokio::time::sleep(self.account_latency).await;
        if self.fail_accounts {
            return Err(BackendError::Status {
                status: 503,
                body: "account index unavailable".to_string(),
            });
        }

        let handle = handle_of(query);
        // Roughly a third of queries have no account.
        if seed_of(&handle) % 3 == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![AccountMatch::new(format!("demo-{}", seed_of(&handle)), handle)])
    }

    async fn lookup_public_records(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<PublicRecord>, BackendError> {
        tokio::time::sleep(self.record_latency).await;
        if self.fail_records {
            return Err(BackendError::Network("connection reset by peer".to_string()));
        }

        let SearchQuery::Name { first, last } = query else {
            return Ok(Vec::new());
        };
        let full_name = format!("{} {}", first.trim(), last.trim());
        let seed = seed_of(&full_name);
        let count = seed % 3;

        Ok((0..count)
            .map(|i| {
                let (city, state) = PLACES[(seed + i) % PLACES.len()];
                PublicRecord::new(full_name.clone())
                    .with_location(city, state)
                    .with_age(u16::try_from(25 + (seed + i * 7) % 50).unwrap_or(40))
            })
            .collect())
    }
}

#[async_trait]
impl AvailabilityCheck for DemoBackend {
    async fn check_availability(&self, value: &str) -> Result<bool, BackendError> {
        tokio::time::sleep(self.account_latency).await;
        let value = value.to_lowercase();
        Ok(!RESERVED.contains(&value.as_str()))
    }
}
