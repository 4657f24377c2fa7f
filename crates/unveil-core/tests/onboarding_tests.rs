use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use unveil_core::{
    DisclosureError, NoopNotifier, OnboardingError, OnboardingWizard, Phase, RowStatus,
    ValidationStatus,
};
use unveil_test_utils::{test_config, RecordingProfileStore, ScriptedAvailability};

fn wizard(
    store: &Arc<RecordingProfileStore>,
    taken: &[&str],
) -> OnboardingWizard {
    let availability = Arc::new(ScriptedAvailability::new(
        taken.iter().copied(),
        Duration::from_millis(50),
    ));
    OnboardingWizard::new(
        store.clone(),
        availability,
        &test_config(),
        Arc::new(NoopNotifier),
    )
}

#[tokio::test(start_paused = true)]
async fn test_full_onboarding_flow() {
    let store = Arc::new(RecordingProfileStore::new(true, Duration::from_millis(100)));
    let wizard = wizard(&store, &[]);

    wizard.start("user-1").unwrap();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(wizard.phase(), Phase::Step(0));
    assert_eq!(wizard.rows()[0].status, RowStatus::Active);

    wizard.pin_location(41.8781, -87.6298).unwrap();
    wizard.attach_photo("https://cdn.example.com/p/1.jpg").unwrap();
    wizard.set_username("jane");
    assert_eq!(wizard.settle_username().await.status, ValidationStatus::Available);
    wizard.confirm_username().unwrap();

    let profile = wizard.wait_until_complete().await.unwrap().unwrap();
    assert!(profile.onboarded);
    assert_eq!(profile.username, "jane");
    assert_eq!(wizard.profile(), Some(profile));

    let saved = store.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].user_id, "user-1");
    assert_eq!(saved[0].photo_url, "https://cdn.example.com/p/1.jpg");

    let details: Vec<_> = wizard.rows().into_iter().map(|r| r.detail).collect();
    assert_eq!(
        details,
        vec![
            Some("Pinned at 41.8781, -87.6298".to_string()),
            Some("Photo uploaded".to_string()),
            Some("@jane".to_string()),
            Some("Welcome, @jane".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_step_waits_for_user_input() {
    let store = Arc::new(RecordingProfileStore::new(true, Duration::ZERO));
    let wizard = wizard(&store, &[]);

    wizard.start("user-1").unwrap();
    sleep(Duration::from_secs(10)).await;
    assert_eq!(wizard.phase(), Phase::Step(0));

    wizard.pin_location(0.0, 0.0).unwrap();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(wizard.phase(), Phase::Step(1));
    assert!(store.saved().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_taken_username_is_rejected() {
    let store = Arc::new(RecordingProfileStore::new(true, Duration::ZERO));
    let wizard = wizard(&store, &["jane"]);
    wizard.start("user-1").unwrap();

    wizard.set_username("jane");
    assert_eq!(wizard.settle_username().await.status, ValidationStatus::Unavailable);
    assert!(matches!(
        wizard.confirm_username(),
        Err(DisclosureError::Onboarding(OnboardingError::UsernameUnavailable(name))) if name == "jane"
    ));

    wizard.set_username("ja");
    assert!(matches!(
        wizard.confirm_username(),
        Err(DisclosureError::Onboarding(OnboardingError::UsernameTooShort { min: 3 }))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_store_not_confirming_fails_last_step() {
    let store = Arc::new(RecordingProfileStore::new(false, Duration::ZERO));
    let wizard = wizard(&store, &[]);
    wizard.start("user-1").unwrap();

    wizard.pin_location(10.0, 20.0).unwrap();
    wizard.attach_photo("photo.jpg").unwrap();
    wizard.set_username("jane");
    wizard.settle_username().await;
    wizard.confirm_username().unwrap();

    let profile = wizard.wait_until_complete().await.unwrap();
    assert_eq!(profile, None);
    assert_eq!(
        wizard.rows()[3].detail.as_deref(),
        Some("Failed: profile saved but not marked onboarded")
    );
}

#[tokio::test(start_paused = true)]
async fn test_inputs_require_started_session() {
    let store = Arc::new(RecordingProfileStore::new(true, Duration::ZERO));
    let wizard = wizard(&store, &[]);

    assert!(matches!(
        wizard.pin_location(1.0, 1.0),
        Err(DisclosureError::Onboarding(OnboardingError::NotStarted))
    ));

    wizard.start("user-1").unwrap();
    assert!(matches!(
        wizard.pin_location(91.0, 1.0),
        Err(DisclosureError::Onboarding(OnboardingError::InvalidLocation { .. }))
    ));
    assert!(matches!(
        wizard.attach_photo("  "),
        Err(DisclosureError::Onboarding(OnboardingError::MissingPhoto))
    ));
    assert!(wizard.start(" ").is_err());
}

#[tokio::test(start_paused = true)]
async fn test_restart_clears_previous_inputs() {
    let store = Arc::new(RecordingProfileStore::new(true, Duration::ZERO));
    let wizard = wizard(&store, &[]);

    wizard.start("user-1").unwrap();
    wizard.pin_location(1.0, 1.0).unwrap();
    sleep(Duration::from_millis(900)).await;
    assert_eq!(wizard.phase(), Phase::Step(1));

    wizard.start("user-2").unwrap();
    sleep(Duration::from_secs(5)).await;
    assert_eq!(wizard.phase(), Phase::Step(0));
    assert!(wizard.rows().iter().all(|r| r.detail.is_none()));
}

#[tokio::test(start_paused = true)]
async fn test_teardown_releases_waiting_steps() {
    let store = Arc::new(RecordingProfileStore::new(true, Duration::ZERO));
    let wizard = wizard(&store, &[]);
    wizard.start("user-1").unwrap();
    sleep(Duration::from_millis(10)).await;

    wizard.teardown();
    sleep(Duration::from_secs(1)).await;

    assert!(matches!(
        wizard.wait_until_complete().await,
        Err(DisclosureError::TornDown)
    ));
    assert_eq!(wizard.phase(), Phase::Step(0));
    assert!(matches!(wizard.start("user-1"), Err(DisclosureError::TornDown)));
    assert_eq!(wizard.phase(), Phase::Step(0));
    assert_eq!(wizard.profile(), None);
}
