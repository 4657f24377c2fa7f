//! Onboarding wizard
//!
//! Profile completion as a phase plan: each step's lookup waits for the user
//! to satisfy its gate (map pin, photo, available username) and the last step
//! writes the profile.
//!
//! The profile write returns the authoritative post-write state. There is no
//! read-back loop: if the store does not report the profile as onboarded, the
//! step fails with that reason.

use crate::backend::{AvailabilityCheck, ProfileDraft, ProfileState, ProfileStore};
use crate::config::UnveilConfig;
use crate::error::{DisclosureError, LookupError, OnboardingError, QueryError};
use crate::notifier::Notifier;
use crate::plan::{PhasePlan, PhaseSpec};
use crate::sequencer::{PhaseSequencer, Snapshot};
use crate::types::{
    DisclosureRow, Phase, PhaseResult, RunId, Submission, Summarize, ValidationState,
    ValidationStatus,
};
use crate::validator::DebouncedValidator;
use std::sync::Arc;
use tokio::sync::watch;

/// Index of the map pin step
pub const STEP_LOCATION: usize = 0;
/// Index of the photo step
pub const STEP_PHOTO: usize = 1;
/// Index of the username step
pub const STEP_USERNAME: usize = 2;
/// Index of the profile write step
pub const STEP_SAVE: usize = 3;

/// Account being onboarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingSession {
    /// Account id
    pub user_id: String,
}

impl Submission for OnboardingSession {
    fn validate(&self) -> Result<(), QueryError> {
        if self.user_id.trim().is_empty() {
            return Err(QueryError::MissingUser);
        }
        Ok(())
    }
}

/// Payload of an onboarding step
#[derive(Debug, Clone, PartialEq)]
pub enum OnboardingPayload {
    /// Home pin
    Location {
        /// Latitude in degrees
        lat: f64,
        /// Longitude in degrees
        lng: f64,
    },
    /// Uploaded photo reference
    Photo(String),
    /// Confirmed username
    Username(String),
    /// Stored profile
    Profile(ProfileState),
}

impl Summarize for OnboardingPayload {
    fn summary(&self) -> String {
        match self {
            Self::Location { lat, lng } => format!("Pinned at {lat:.4}, {lng:.4}"),
            Self::Photo(_) => "Photo uploaded".to_string(),
            Self::Username(name) => format!("@{name}"),
            Self::Profile(state) => format!("Welcome, @{}", state.username),
        }
    }
}

/// User-satisfied inputs, one watch channel per gate
struct Gates {
    location: watch::Sender<Option<(f64, f64)>>,
    photo: watch::Sender<Option<String>>,
    username: watch::Sender<Option<String>>,
    /// Bumped on restart and teardown to release waiting steps
    epoch: watch::Sender<u64>,
}

impl Gates {
    fn new() -> Self {
        Self {
            location: watch::channel(None).0,
            photo: watch::channel(None).0,
            username: watch::channel(None).0,
            epoch: watch::channel(0).0,
        }
    }

    /// Clear every gate and release steps of the previous session
    fn clear(&self) {
        self.epoch.send_modify(|epoch| *epoch += 1);
        self.location.send_replace(None);
        self.photo.send_replace(None);
        self.username.send_replace(None);
    }

    fn current_epoch(&self) -> u64 {
        *self.epoch.borrow()
    }

    /// Wait until `gate` holds a value, or fail once `epoch` is over
    async fn satisfied<T: Clone>(
        &self,
        gate: &watch::Sender<Option<T>>,
        epoch: u64,
    ) -> Result<T, LookupError> {
        let mut value_rx = gate.subscribe();
        let mut epoch_rx = self.epoch.subscribe();

        tokio::select! {
            value = value_rx.wait_for(Option::is_some) => {
                let value = value.map_err(|_| LookupError::Abandoned)?;
                value.clone().ok_or(LookupError::Abandoned)
            }
            _ = epoch_rx.wait_for(|current| *current != epoch) => Err(LookupError::Abandoned),
        }
    }
}

fn onboarding_plan(
    gates: &Arc<Gates>,
    store: Arc<dyn ProfileStore>,
    config: &UnveilConfig,
) -> PhasePlan<OnboardingSession, OnboardingPayload> {
    let location = Arc::clone(gates);
    let photo = Arc::clone(gates);
    let username = Arc::clone(gates);
    let save = Arc::clone(gates);

    PhasePlan::new(config.dwell())
        .with_phase(PhaseSpec::new("Pin your location").with_fn(
            move |_: OnboardingSession| {
                let gates = Arc::clone(&location);
                let epoch = gates.current_epoch();
                async move {
                    let (lat, lng) = gates.satisfied(&gates.location, epoch).await?;
                    Ok(OnboardingPayload::Location { lat, lng })
                }
            },
        ))
        .with_phase(PhaseSpec::new("Add a profile photo").with_fn(
            move |_: OnboardingSession| {
                let gates = Arc::clone(&photo);
                let epoch = gates.current_epoch();
                async move {
                    let url = gates.satisfied(&gates.photo, epoch).await?;
                    Ok(OnboardingPayload::Photo(url))
                }
            },
        ))
        .with_phase(PhaseSpec::new("Choose a username").with_fn(
            move |_: OnboardingSession| {
                let gates = Arc::clone(&username);
                let epoch = gates.current_epoch();
                async move {
                    let name = gates.satisfied(&gates.username, epoch).await?;
                    Ok(OnboardingPayload::Username(name))
                }
            },
        ))
        .with_phase(PhaseSpec::new("Finishing your profile").with_fn(
            move |session: OnboardingSession| {
                let gates = Arc::clone(&save);
                let store = Arc::clone(&store);
                let epoch = gates.current_epoch();
                async move {
                    let (latitude, longitude) = gates.satisfied(&gates.location, epoch).await?;
                    let draft = ProfileDraft {
                        user_id: session.user_id,
                        username: gates.satisfied(&gates.username, epoch).await?,
                        latitude,
                        longitude,
                        photo_url: gates.satisfied(&gates.photo, epoch).await?,
                    };

                    let state = store.save_profile(&draft).await?;
                    if !state.onboarded {
                        return Err(LookupError::Other(
                            "profile saved but not marked onboarded".to_string(),
                        ));
                    }
                    tracing::info!(user = %state.user_id, "Profile onboarded");
                    Ok(OnboardingPayload::Profile(state))
                }
            },
        ))
}

/// Onboarding wizard controller
pub struct OnboardingWizard {
    sequencer: PhaseSequencer<OnboardingSession, OnboardingPayload>,
    validator: DebouncedValidator,
    gates: Arc<Gates>,
}

impl OnboardingWizard {
    /// Create an idle wizard
    #[must_use]
    pub fn new(
        store: Arc<dyn ProfileStore>,
        availability: Arc<dyn AvailabilityCheck>,
        config: &UnveilConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let gates = Arc::new(Gates::new());
        let plan = onboarding_plan(&gates, store, config);
        Self {
            sequencer: PhaseSequencer::new(plan, Arc::clone(&notifier)),
            validator: DebouncedValidator::new(availability, config.validator, notifier),
            gates,
        }
    }

    /// Begin onboarding `user_id`; any earlier session is discarded
    ///
    /// # Errors
    /// See [`PhaseSequencer::submit`]
    pub fn start(&self, user_id: impl Into<String>) -> Result<RunId, DisclosureError> {
        let session = OnboardingSession {
            user_id: user_id.into(),
        };
        session.validate()?;
        if !self.sequencer.is_alive() {
            return Err(DisclosureError::TornDown);
        }
        // Old step lookups wait on these gates; clear before the new run exists.
        self.sequencer.reset();
        self.gates.clear();
        self.sequencer.submit(session)
    }

    fn ensure_started(&self) -> Result<(), OnboardingError> {
        if self.sequencer.snapshot().run.is_none() {
            return Err(OnboardingError::NotStarted);
        }
        Ok(())
    }

    /// Set the home pin
    ///
    /// # Errors
    /// `NotStarted` before [`start`](Self::start); `InvalidLocation` for
    /// non-finite or out-of-range coordinates
    pub fn pin_location(&self, lat: f64, lng: f64) -> Result<(), DisclosureError> {
        self.ensure_started()?;
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        if !valid {
            return Err(OnboardingError::InvalidLocation { lat, lng }.into());
        }
        self.gates.location.send_replace(Some((lat, lng)));
        Ok(())
    }

    /// Attach an uploaded photo
    ///
    /// # Errors
    /// `NotStarted` before [`start`](Self::start); `MissingPhoto` for an empty reference
    pub fn attach_photo(&self, url: impl Into<String>) -> Result<(), DisclosureError> {
        self.ensure_started()?;
        let url = url.into();
        if url.trim().is_empty() {
            return Err(OnboardingError::MissingPhoto.into());
        }
        self.gates.photo.send_replace(Some(url.trim().to_string()));
        Ok(())
    }

    /// Username field changed
    pub fn set_username(&self, value: impl Into<String>) {
        self.validator.set_value(value);
    }

    /// Username field state
    #[must_use]
    pub fn username_state(&self) -> ValidationState {
        self.validator.state()
    }

    /// Wait for the pending username check
    pub async fn settle_username(&self) -> ValidationState {
        self.validator.settle().await
    }

    /// Submit the username step
    ///
    /// # Errors
    /// `UsernameTooShort` below the minimum length; `UsernameUnavailable`
    /// when the check reported the name as taken. An unknown status (check
    /// pending or failed) does not block.
    pub fn confirm_username(&self) -> Result<(), DisclosureError> {
        self.ensure_started()?;
        let state = self.validator.state();
        let name = state.value.trim().to_string();

        let min = self.validator.min_length();
        if name.chars().count() < min {
            return Err(OnboardingError::UsernameTooShort { min }.into());
        }
        if state.status == ValidationStatus::Unavailable {
            return Err(OnboardingError::UsernameUnavailable(name).into());
        }

        self.gates.username.send_replace(Some(name));
        Ok(())
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

    /// Stored profile once the last step succeeded
    #[must_use]
    pub fn profile(&self) -> Option<ProfileState> {
        profile_of(&self.sequencer.snapshot())
    }

    /// Wait for the wizard to finish
    ///
    /// # Errors
    /// `DisclosureError::TornDown` if the wizard is torn down first
    pub async fn wait_until_complete(&self) -> Result<Option<ProfileState>, DisclosureError> {
        let snapshot = self.sequencer.wait_until_complete().await?;
        Ok(profile_of(&snapshot))
    }

    /// Stop the wizard and its validator
    pub fn teardown(&self) {
        self.sequencer.teardown();
        self.validator.teardown();
        self.gates.clear();
    }
}

fn profile_of(snapshot: &Snapshot<OnboardingSession, OnboardingPayload>) -> Option<ProfileState> {
    match snapshot.results.get(STEP_SAVE) {
        Some(PhaseResult::Succeeded(OnboardingPayload::Profile(state))) => Some(state.clone()),
        _ => None,
    }
}
