//! Unveil Core - progressive disclosure controllers
//!
//! Drives a submitted query through an ordered list of phases and exposes a
//! step list whose state is derived purely from the current phase and the
//! results gathered so far:
//! - [`PhaseSequencer`]: generic multi-phase controller with dwell pacing
//! - [`ResultSet`]: forward-only per-phase result slots
//! - [`render`]: pure (phase, results) → rows mapping
//! - [`DebouncedValidator`]: remote availability checks that never go stale
//! - [`PeopleFinder`] and [`OnboardingWizard`]: the two configured use sites
//!
//! # Example
//!
//! ```rust,ignore
//! use unveil_core::{NoopNotifier, PeopleFinder, SearchQuery, UnveilConfig};
//! use std::sync::Arc;
//!
//! # async fn example(backend: Arc<dyn unveil_core::PeopleSearchBackend>) -> Result<(), Box<dyn std::error::Error>> {
//! let finder = PeopleFinder::new(backend, &UnveilConfig::new(), Arc::new(NoopNotifier));
//!
//! finder.submit(SearchQuery::name("Jane", "Doe"))?;
//! let summary = finder.wait_until_complete().await?;
//!
//! for row in finder.rows() {
//!     println!("{row}");
//! }
//! println!("{} matches", summary.total_matches());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod accumulator;
pub mod backend;
pub mod config;
pub mod error;
pub mod notifier;
pub mod onboarding;
pub mod people_finder;
pub mod plan;
pub mod render;
pub mod sequencer;
pub mod types;
pub mod validator;

// Re-exports for convenience
pub use accumulator::{Change, ResultSet};
pub use backend::{
    AccountMatch, AvailabilityCheck, PeopleSearchBackend, ProfileDraft, ProfileState,
    ProfileStore, PublicRecord,
};
pub use config::{HttpConfig, PeopleConfig, UnveilConfig, ValidatorConfig};
pub use error::{
    BackendError, ConfigError, DisclosureError, LookupError, OnboardingError, QueryError,
};
pub use notifier::{NoopNotifier, Notifier};
pub use onboarding::{OnboardingPayload, OnboardingSession, OnboardingWizard};
pub use people_finder::{FinderPayload, FinderSummary, PeopleFinder};
pub use plan::{Dispatch, FnLookup, PhaseLookup, PhasePlan, PhaseSpec};
pub use render::render;
pub use sequencer::{PhaseSequencer, Snapshot};
pub use types::{
    DisclosureRow, Phase, PhaseResult, RowStatus, RunId, SearchQuery, Submission, Summarize,
    ValidationState, ValidationStatus,
};
pub use validator::DebouncedValidator;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Unveil Core
    pub use crate::{
        DisclosureRow, NoopNotifier, Notifier, Phase, PhasePlan, PhaseSequencer, PhaseSpec,
        RowStatus, SearchQuery, Summarize, UnveilConfig,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
