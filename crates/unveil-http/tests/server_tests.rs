use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use unveil_core::{
    AccountMatch, AvailabilityCheck, BackendError, PeopleSearchBackend, ProfileDraft,
    ProfileState, ProfileStore, PublicRecord, SearchQuery,
};
use unveil_http::HttpBackend;

/// Requests seen by the local service
#[derive(Default)]
struct Seen {
    values: Mutex<Vec<String>>,
    bodies: Mutex<Vec<Value>>,
}

async fn availability(
    State(seen): State<Arc<Seen>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let value = params.get("value").cloned().unwrap_or_default();
    seen.values.lock().unwrap().push(value.clone());
    match value.as_str() {
        "boom" => (StatusCode::INTERNAL_SERVER_ERROR, "availability store down").into_response(),
        v => Json(json!({ "available": v != "taken" })).into_response(),
    }
}

async fn account_match(State(seen): State<Arc<Seen>>, Json(body): Json<Value>) -> Response {
    seen.bodies.lock().unwrap().push(body.clone());
    match body["kind"].as_str() {
        Some("phone") => (StatusCode::SERVICE_UNAVAILABLE, "index rebuilding").into_response(),
        Some("email") => Json(json!({})).into_response(),
        _ => Json(json!({
            "matches": [{ "user_id": "u1", "username": "jane", "display_name": "Jane Doe" }]
        }))
        .into_response(),
    }
}

async fn public_records(State(seen): State<Arc<Seen>>, Json(body): Json<Value>) -> Response {
    seen.bodies.lock().unwrap().push(body.clone());
    match body["last"].as_str() {
        Some("Quota") => Json(json!({ "error": "quota exceeded" })).into_response(),
        Some("Garbled") => (StatusCode::OK, "<html>maintenance</html>").into_response(),
        Some("Missing") => (StatusCode::NOT_FOUND, "no such dataset").into_response(),
        _ => Json(json!({
            "records": [
                { "full_name": "Jane Doe", "city": "Chicago", "state": "IL", "age": 34 },
                { "full_name": "Jane Doe" }
            ]
        }))
        .into_response(),
    }
}

async fn profile(State(seen): State<Arc<Seen>>, Json(draft): Json<ProfileDraft>) -> Response {
    seen.bodies
        .lock()
        .unwrap()
        .push(serde_json::to_value(&draft).unwrap());
    if draft.username == "reject" {
        return (StatusCode::UNPROCESSABLE_ENTITY, "username reserved").into_response();
    }
    Json(ProfileState {
        onboarded: draft.photo_url.starts_with("https://"),
        user_id: draft.user_id,
        username: draft.username,
    })
    .into_response()
}

/// Start the service on an ephemeral port; returns its base URL
async fn serve() -> (String, Arc<Seen>) {
    let seen = Arc::new(Seen::default());
    let app = Router::new()
        .route("/api/username-availability", get(availability))
        .route("/api/people/account-match", post(account_match))
        .route("/api/people/public-records", post(public_records))
        .route("/api/profile", post(profile))
        .with_state(Arc::clone(&seen));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/api"), seen)
}

async fn backend() -> (HttpBackend, Arc<Seen>) {
    let (base, seen) = serve().await;
    (HttpBackend::new(&base, Duration::from_secs(5)).unwrap(), seen)
}

#[tokio::test]
async fn test_availability_round_trip() {
    let (backend, seen) = backend().await;

    assert!(backend.check_availability("jane").await.unwrap());
    assert!(!backend.check_availability("taken").await.unwrap());
    assert!(backend.check_availability("jane doe&x=1").await.unwrap());

    assert_eq!(
        *seen.values.lock().unwrap(),
        vec!["jane".to_string(), "taken".to_string(), "jane doe&x=1".to_string()]
    );
}

#[tokio::test]
async fn test_availability_error_status() {
    let (backend, _) = backend().await;

    let err = backend.check_availability("boom").await.unwrap_err();
    assert_eq!(
        err,
        BackendError::Status {
            status: 500,
            body: "availability store down".into(),
        }
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_account_match_posts_query() {
    let (backend, seen) = backend().await;

    let matches = backend
        .lookup_account_match(&SearchQuery::name("Jane", "Doe"))
        .await
        .unwrap();
    assert_eq!(
        matches,
        vec![AccountMatch::new("u1", "jane").with_display_name("Jane Doe")]
    );
    assert_eq!(
        seen.bodies.lock().unwrap()[0],
        json!({ "kind": "name", "first": "Jane", "last": "Doe" })
    );

    let none = backend
        .lookup_account_match(&SearchQuery::email("jane@example.com"))
        .await
        .unwrap();
    assert!(none.is_empty());

    let err = backend
        .lookup_account_match(&SearchQuery::phone("312-555-0100"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        BackendError::Status {
            status: 503,
            body: "index rebuilding".into(),
        }
    );
}

#[tokio::test]
async fn test_public_records_outcomes() {
    let (backend, _) = backend().await;

    let records = backend
        .lookup_public_records(&SearchQuery::name("Jane", "Doe"))
        .await
        .unwrap();
    assert_eq!(
        records,
        vec![
            PublicRecord::new("Jane Doe").with_location("Chicago", "IL").with_age(34),
            PublicRecord::new("Jane Doe"),
        ]
    );

    let remote = backend
        .lookup_public_records(&SearchQuery::name("Jane", "Quota"))
        .await;
    assert_eq!(remote, Err(BackendError::Remote("quota exceeded".into())));

    let garbled = backend
        .lookup_public_records(&SearchQuery::name("Jane", "Garbled"))
        .await;
    assert!(matches!(garbled, Err(BackendError::Decode(_))), "{garbled:?}");

    let missing = backend
        .lookup_public_records(&SearchQuery::name("Jane", "Missing"))
        .await
        .unwrap_err();
    assert!(matches!(missing, BackendError::Status { status: 404, .. }));
    assert!(!missing.is_retryable());
}

#[tokio::test]
async fn test_profile_write_returns_stored_state() {
    let (backend, seen) = backend().await;
    let draft = ProfileDraft {
        user_id: "u1".into(),
        username: "jane".into(),
        latitude: 41.8781,
        longitude: -87.6298,
        photo_url: "https://cdn.example.com/jane.jpg".into(),
    };

    let state = backend.save_profile(&draft).await.unwrap();
    assert_eq!(
        state,
        ProfileState {
            user_id: "u1".into(),
            username: "jane".into(),
            onboarded: true,
        }
    );
    assert_eq!(
        seen.bodies.lock().unwrap()[0],
        json!({
            "user_id": "u1",
            "username": "jane",
            "latitude": 41.8781,
            "longitude": -87.6298,
            "photo_url": "https://cdn.example.com/jane.jpg"
        })
    );

    let pending = backend
        .save_profile(&ProfileDraft {
            photo_url: "local/jane.jpg".into(),
            ..draft.clone()
        })
        .await
        .unwrap();
    assert!(!pending.onboarded);

    let rejected = backend
        .save_profile(&ProfileDraft {
            username: "reject".into(),
            ..draft
        })
        .await
        .unwrap_err();
    assert_eq!(
        rejected,
        BackendError::Status {
            status: 422,
            body: "username reserved".into(),
        }
    );
}
