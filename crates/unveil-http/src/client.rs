//! reqwest-backed collaborators
//!
//! One [`HttpBackend`] serves all three collaborator traits against a single
//! base URL:
//! - `GET  {base}/username-availability?value=…`
//! - `POST {base}/people/account-match`
//! - `POST {base}/people/public-records`
//! - `POST {base}/profile`

use crate::wire::{AccountMatchResponse, AvailabilityResponse, PublicRecordsResponse};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use unveil_core::{
    AccountMatch, AvailabilityCheck, BackendError, HttpConfig, PeopleSearchBackend, ProfileDraft,
    ProfileState, ProfileStore, PublicRecord, SearchQuery,
};

const USER_AGENT: &str = concat!("unveil/", env!("CARGO_PKG_VERSION"));

/// Longest response body kept in a `BackendError::Status`
const MAX_ERROR_BODY: usize = 512;

/// Errors building an [`HttpBackend`]
#[derive(Debug, Error)]
pub enum ClientError {
    /// No base URL configured
    #[error("no base URL configured")]
    MissingBaseUrl,

    /// Base URL does not parse or is not http(s)
    #[error("invalid base URL {url}: {reason}")]
    InvalidBaseUrl {
        /// URL as configured
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// reqwest client could not be built
    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

/// HTTP implementation of the collaborator traits
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base: Url,
}

impl HttpBackend {
    /// Create a backend for `base_url` with the given request timeout
    ///
    /// # Errors
    /// `InvalidBaseUrl` if the URL does not parse or is not http(s);
    /// `Build` if the TLS backend cannot be initialised.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base = parse_base(base_url)?;
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;

        tracing::debug!(base = %base, ?timeout, "HTTP backend created");
        Ok(Self { client, base })
    }

    /// Create a backend from the `[http]` configuration section
    ///
    /// # Errors
    /// `MissingBaseUrl` when `base_url` is unset, otherwise see [`HttpBackend::new`]
    pub fn from_config(config: &HttpConfig) -> Result<Self, ClientError> {
        let base_url = config.base_url.as_deref().ok_or(ClientError::MissingBaseUrl)?;
        Self::new(base_url, config.timeout())
    }

    /// Base URL with a trailing slash
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Absolute URL of `path` under the base
    ///
    /// # Errors
    /// `BackendError::Unavailable` if `path` cannot be joined
    pub fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| BackendError::Unavailable(format!("bad endpoint {path}: {e}")))
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, BackendError>
    where
        B: serde::Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        tracing::debug!(url = %url, "POST");

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;
        read_body(response).await
    }
}

/// Parse and normalise the base URL so relative joins keep its path
fn parse_base(base_url: &str) -> Result<Url, ClientError> {
    let invalid = |reason: String| ClientError::InvalidBaseUrl {
        url: base_url.to_string(),
        reason,
    };

    let mut base = Url::parse(base_url.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", base.scheme())));
    }
    if base.cannot_be_a_base() {
        return Err(invalid("cannot be a base".to_string()));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.set_query(None);
    base.set_fragment(None);
    Ok(base)
}

/// Map the status, then decode the body
async fn read_body<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BackendError> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| BackendError::Network(e.to_string()))?;

    if !status.is_success() {
        return Err(status_error(status, &bytes));
    }
    decode(&bytes)
}

pub(crate) fn status_error(status: StatusCode, body: &[u8]) -> BackendError {
    let body: String = String::from_utf8_lossy(body)
        .chars()
        .take(MAX_ERROR_BODY)
        .collect();
    tracing::warn!(status = status.as_u16(), "Backend returned error status");
    BackendError::Status {
        status: status.as_u16(),
        body,
    }
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, BackendError> {
    serde_json::from_slice(bytes).map_err(|e| BackendError::Decode(e.to_string()))
}

#[async_trait]
impl AvailabilityCheck for HttpBackend {
    async fn check_availability(&self, value: &str) -> Result<bool, BackendError> {
        let mut url = self.endpoint("username-availability")?;
        url.query_pairs_mut().append_pair("value", value);
        tracing::debug!(url = %url, "GET");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;
        let body: AvailabilityResponse = read_body(response).await?;
        Ok(body.available)
    }
}

#[async_trait]
impl PeopleSearchBackend for HttpBackend {
    async fn lookup_account_match(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<AccountMatch>, BackendError> {
        let body: AccountMatchResponse = self.post_json("people/account-match", query).await?;
        Ok(body.matches)
    }

    async fn lookup_public_records(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<PublicRecord>, BackendError> {
        let body: PublicRecordsResponse = self.post_json("people/public-records", query).await?;
        body.into_result()
    }
}

#[async_trait]
impl ProfileStore for HttpBackend {
    async fn save_profile(&self, draft: &ProfileDraft) -> Result<ProfileState, BackendError> {
        self.post_json("profile", draft).await
    }
}
