//! Error types for Unveil Core
//!
//! Provides error handling for:
//! - Client-side query validation (blocks submission)
//! - Collaborator failures (advisory or per-phase, never fatal to a run)
//! - Configuration loading
//! - Onboarding gate violations

/// Main error type returned by controller entry points
#[derive(Debug, thiserror::Error)]
pub enum DisclosureError {
    /// Submitted query failed client-side validation
    #[error("invalid query: {0}")]
    InvalidQuery(#[from] QueryError),

    /// Controller was torn down; it no longer accepts work
    #[error("controller has been torn down")]
    TornDown,

    /// Onboarding wizard rejected an input
    #[error("onboarding error: {0}")]
    Onboarding(#[from] OnboardingError),
}

impl DisclosureError {
    /// Check if the error is recoverable by editing the input
    #[inline]
    #[must_use]
    pub fn is_user_recoverable(&self) -> bool {
        matches!(self, Self::InvalidQuery(_) | Self::Onboarding(_))
    }
}

/// Client-side validation errors for submitted queries
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// First or last name missing
    #[error("first and last name are required")]
    MissingName,

    /// Email address is malformed
    #[error("malformed email address: {0}")]
    MalformedEmail(String),

    /// Phone number has the wrong number of digits
    #[error("phone number must have 7 to 15 digits, got {digits}")]
    MalformedPhone {
        /// Digit count after stripping separators
        digits: usize,
    },

    /// Phone number contains characters other than digits and separators
    #[error("phone number contains invalid character {0:?}")]
    InvalidPhoneCharacter(char),

    /// Onboarding session without a user
    #[error("user id is required")]
    MissingUser,
}

/// Failure of a single phase lookup
///
/// Converted into `PhaseResult::Failed` by the sequencer; never crosses a
/// phase boundary as an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// Collaborator call failed
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Lookup was abandoned before it produced a result
    #[error("lookup abandoned")]
    Abandoned,

    /// Lookup-specific failure
    #[error("{0}")]
    Other(String),
}

impl LookupError {
    /// Reason string recorded in the failed phase slot
    #[must_use]
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// Errors reported by backend collaborators
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Transport failure (connection refused, timeout, DNS)
    #[error("network error: {0}")]
    Network(String),

    /// Backend answered with a non-success status
    #[error("backend returned status {status}: {body}")]
    Status {
        /// HTTP-style status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// Backend answered with an explicit error payload
    #[error("backend error: {0}")]
    Remote(String),

    /// Response could not be decoded
    #[error("malformed response: {0}")]
    Decode(String),

    /// Collaborator is not configured
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    /// Check if a later attempt could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Remote(_) | Self::Decode(_) | Self::Unavailable(_) => false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that was read
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// TOML could not be parsed
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Onboarding input errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OnboardingError {
    /// No onboarding session is running
    #[error("onboarding has not been started")]
    NotStarted,

    /// Coordinates outside the valid range
    #[error("coordinates out of range: ({lat}, {lng})")]
    InvalidLocation {
        /// Latitude in degrees
        lat: f64,
        /// Longitude in degrees
        lng: f64,
    },

    /// Photo reference is empty
    #[error("photo reference is empty")]
    MissingPhoto,

    /// Username shorter than the minimum length
    #[error("username must be at least {min} characters")]
    UsernameTooShort {
        /// Required minimum
        min: usize,
    },

    /// Username is already taken
    #[error("username {0:?} is not available")]
    UsernameUnavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disclosure_error_display() {
        let err = DisclosureError::from(QueryError::MissingName);
        assert!(err.to_string().contains("invalid query"));
        assert!(err.is_user_recoverable());
        assert!(!DisclosureError::TornDown.is_user_recoverable());
    }

    #[test]
    fn backend_error_is_retryable() {
        assert!(BackendError::Network("refused".into()).is_retryable());
        assert!(BackendError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(BackendError::Status { status: 429, body: String::new() }.is_retryable());
        assert!(!BackendError::Status { status: 404, body: String::new() }.is_retryable());
        assert!(!BackendError::Remote("nope".into()).is_retryable());
    }

    #[test]
    fn lookup_error_reason_is_transparent() {
        let err = LookupError::from(BackendError::Network("connection reset".into()));
        assert_eq!(err.reason(), "network error: connection reset");
    }

    #[test]
    fn onboarding_error_compares_coordinates() {
        let err = OnboardingError::InvalidLocation { lat: 91.0, lng: 0.0 };
        assert_eq!(err.clone(), err);
        assert_ne!(err, OnboardingError::InvalidLocation { lat: 90.0, lng: 0.0 });
        assert!(DisclosureError::from(err).is_user_recoverable());
    }
}
