//! Response bodies of the collaborator endpoints

use serde::Deserialize;
use unveil_core::{AccountMatch, BackendError, PublicRecord};

/// `GET /username-availability`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AvailabilityResponse {
    pub(crate) available: bool,
}

/// `POST /people/account-match`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AccountMatchResponse {
    #[serde(default)]
    pub(crate) matches: Vec<AccountMatch>,
}

/// `POST /people/public-records`
///
/// The service answers either with records or with an error message.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum PublicRecordsResponse {
    Records { records: Vec<PublicRecord> },
    Error { error: String },
}

impl PublicRecordsResponse {
    pub(crate) fn into_result(self) -> Result<Vec<PublicRecord>, BackendError> {
        match self {
            Self::Records { records } => Ok(records),
            Self::Error { error } => Err(BackendError::Remote(error)),
        }
    }
}
