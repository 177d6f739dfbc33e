//! End-to-end scenarios for the Rent-A-Bot API.
//!
//! Each test drives the full Axum application through `oneshot` requests,
//! holding onto the shared catalog so background-loop ticks can be run
//! deterministically with an explicit clock instead of sleeping.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use rentabot_api::{create_api_router, ApiConfig, AppState};
use rentabot_core::{Catalog, Resource, ResourceId};
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_app(resources: Vec<Resource>) -> (Arc<Catalog>, Router) {
    let catalog = Arc::new(Catalog::from_resources(resources));
    let app = create_api_router(AppState::new(catalog.clone()), &ApiConfig::default());
    (catalog, app)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request"),
    };

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let payload = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, payload)
}

fn timestamp(value: &Value) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value.as_str().expect("timestamp string"))
        .expect("rfc3339 timestamp")
        .with_timezone(&Utc)
}

#[tokio::test]
async fn simple_lock_unlock_round_trip() {
    let (_, app) = test_app(vec![Resource::new(ResourceId(1), "r")]);

    let (status, payload) = send(
        &app,
        "POST",
        "/api/v1/resources/1/lock",
        Some(json!({"ttl": 60})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let token = payload["lock-token"].as_str().expect("token").to_string();
    assert!(!token.is_empty());
    let locked_at = timestamp(&payload["locked-at"]);
    let expires_at = timestamp(&payload["expires-at"]);
    assert_eq!((expires_at - locked_at).num_seconds(), 60);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/resources/1/unlock?lock-token={}", token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, payload) = send(&app, "GET", "/api/v1/resources/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["resource"]["lock-token"], "");
    assert_eq!(payload["resource"]["lock-details"], "Resource available");
}

#[tokio::test]
async fn double_lock_is_forbidden() {
    let (_, app) = test_app(vec![Resource::new(ResourceId(1), "r")]);

    let (status, _) = send(&app, "POST", "/api/v1/resources/1/lock", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, payload) = send(&app, "POST", "/api/v1/resources/1/lock", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(payload["code"], "RESOURCE_ALREADY_LOCKED");
}

#[tokio::test]
async fn tag_criteria_lock_matches_all_required_tags() {
    let (_, app) = test_app(vec![
        Resource::new(ResourceId(1), "arduino-1").with_tags("arduino,leds"),
        Resource::new(ResourceId(2), "arduino-2").with_tags("arduino,motors"),
    ]);

    let (status, payload) = send(
        &app,
        "POST",
        "/api/v1/resources/lock?tag=arduino&tag=leds",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let tags = payload["resource"]["tags"].as_str().expect("tags");
    assert!(tags.contains("arduino") && tags.contains("leds"));

    // The only match is now held.
    let (status, payload) = send(
        &app,
        "POST",
        "/api/v1/resources/lock?tag=arduino&tag=leds",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(payload["code"], "RESOURCE_ALREADY_LOCKED");
}

#[tokio::test]
async fn criteria_lock_without_criterion_is_bad_request() {
    let (_, app) = test_app(vec![Resource::new(ResourceId(1), "r")]);
    let (status, _) = send(&app, "POST", "/api/v1/resources/lock?color=blue", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn extend_is_bounded_and_refreshes_absolutely() {
    let (_, app) = test_app(vec![
        Resource::new(ResourceId(1), "bench").with_max_lock_duration(7_200)
    ]);

    let (status, payload) = send(
        &app,
        "POST",
        "/api/v1/resources/1/lock",
        Some(json!({"ttl": 3600})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = payload["lock-token"].as_str().expect("token").to_string();
    let original_expires = timestamp(&payload["expires-at"]);

    let (status, payload) = send(
        &app,
        "POST",
        &format!(
            "/api/v1/resources/1/extend?lock-token={}&additional-ttl=10000",
            token
        ),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["code"], "INVALID_TTL");

    let (status, payload) = send(
        &app,
        "POST",
        &format!(
            "/api/v1/resources/1/extend?lock-token={}&additional-ttl=3000",
            token
        ),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Absolute refresh: the new deadline is now + 3000s, which is earlier
    // than the original one-hour deadline.
    let new_expires = timestamp(&payload["new-expires-at"]);
    assert!(new_expires < original_expires);
    let total = payload["total-lock-duration"].as_i64().expect("duration");
    assert!((2_999..=3_001).contains(&total));
}

#[tokio::test]
async fn reservation_fifo_fulfillment_and_claim() {
    let (catalog, app) = test_app(vec![
        Resource::new(ResourceId(1), "linux-1").with_tags("ci,linux"),
        Resource::new(ResourceId(2), "linux-2").with_tags("ci,linux"),
        Resource::new(ResourceId(3), "windows-1").with_tags("ci,windows"),
    ]);

    // Pre-lock both linux resources externally.
    let held = catalog
        .lock_by_tags(&["ci".to_string(), "linux".to_string()], 2, 3_600)
        .expect("pre-lock");

    // Lodge three reservations; they queue FIFO.
    let mut ids = Vec::new();
    for _ in 0..3 {
        let (status, payload) = send(
            &app,
            "POST",
            "/api/v1/reservations",
            Some(json!({"tags": ["ci", "linux"], "quantity": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(payload["status"], "pending");
        ids.push(payload["reservation_id"].as_str().expect("id").to_string());
    }

    for (index, id) in ids.iter().enumerate() {
        let (status, payload) = send(&app, "GET", &format!("/api/v1/reservations/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["position_in_queue"], index as u64 + 1);
    }

    // Free one linux resource, then run one scheduler tick: the oldest
    // reservation is fulfilled, the others keep waiting at positions 1, 2.
    let token = held[0].lock.as_ref().expect("held").token.clone();
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/resources/{}/unlock?lock-token={}", held[0].id, token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let tick = catalog.run_scheduler_tick(Utc::now());
    assert_eq!(tick.fulfilled.len(), 1);
    assert_eq!(tick.fulfilled[0].0, ids[0]);

    let (_, payload) = send(&app, "GET", &format!("/api/v1/reservations/{}", ids[0]), None).await;
    assert_eq!(payload["status"], "fulfilled");
    assert_eq!(payload["resource_ids"].as_array().expect("ids").len(), 1);

    let (_, payload) = send(&app, "GET", &format!("/api/v1/reservations/{}", ids[1]), None).await;
    assert_eq!(payload["status"], "pending");
    assert_eq!(payload["position_in_queue"], 1);
    let (_, payload) = send(&app, "GET", &format!("/api/v1/reservations/{}", ids[2]), None).await;
    assert_eq!(payload["position_in_queue"], 2);

    // Claim the fulfilled reservation inside the 60s window.
    let (status, payload) = send(
        &app,
        "POST",
        &format!("/api/v1/reservations/{}/claim", ids[0]),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["status"], "claimed");
    assert!(payload["claimed_at"].is_string());
}

#[tokio::test]
async fn unclaimed_fulfillment_is_reclaimed_after_the_window() {
    let (catalog, app) = test_app(vec![
        Resource::new(ResourceId(1), "linux-1").with_tags("ci,linux"),
    ]);

    let (status, payload) = send(
        &app,
        "POST",
        "/api/v1/reservations",
        Some(json!({"tags": ["ci", "linux"], "quantity": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = payload["reservation_id"].as_str().expect("id").to_string();

    let now = Utc::now();
    let tick = catalog.run_scheduler_tick(now);
    assert_eq!(tick.fulfilled.len(), 1);
    assert!(catalog.get_resource(ResourceId(1)).expect("resource").is_locked());

    // Nobody claims within 60 seconds: the next tick past the window frees
    // the resource and deletes the reservation.
    let later = now + Duration::seconds(61);
    let tick = catalog.run_scheduler_tick(later);
    assert_eq!(tick.claims_expired.len(), 1);
    assert!(!catalog.get_resource(ResourceId(1)).expect("resource").is_locked());

    let (status, _) = send(&app, "GET", &format!("/api/v1/reservations/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, payload) = send(
        &app,
        "POST",
        &format!("/api/v1/reservations/{}/claim", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(payload["code"], "RESERVATION_NOT_FOUND");
}

#[tokio::test]
async fn expired_lock_is_reaped_with_an_audit_trail() {
    let (catalog, app) = test_app(vec![Resource::new(ResourceId(1), "r")]);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/resources/1/lock",
        Some(json!({"ttl": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Drive the reaper clock past the TTL instead of sleeping.
    let reaped = catalog.reap_expired_locks(Utc::now() + Duration::seconds(2));
    assert_eq!(reaped, vec![ResourceId(1)]);

    let (_, payload) = send(&app, "GET", "/api/v1/resources/1", None).await;
    assert_eq!(payload["resource"]["lock-token"], "");
    assert!(payload["resource"]["lock-details"]
        .as_str()
        .expect("details")
        .starts_with("Auto-expired at "));
}

#[tokio::test]
async fn cancelling_a_fulfilled_reservation_is_a_conflict() {
    let (catalog, app) = test_app(vec![
        Resource::new(ResourceId(1), "linux-1").with_tags("ci,linux"),
    ]);

    let (_, payload) = send(
        &app,
        "POST",
        "/api/v1/reservations",
        Some(json!({"tags": ["ci", "linux"], "quantity": 1})),
    )
    .await;
    let id = payload["reservation_id"].as_str().expect("id").to_string();
    catalog.run_scheduler_tick(Utc::now());

    let (status, payload) = send(
        &app,
        "DELETE",
        &format!("/api/v1/reservations/{}", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(payload["code"], "RESERVATION_CANNOT_BE_CANCELLED");
}

#[tokio::test]
async fn pending_reservation_cancel_returns_no_content() {
    let (_, app) = test_app(vec![
        Resource::new(ResourceId(1), "linux-1").with_tags("ci,linux"),
    ]);

    let (_, payload) = send(
        &app,
        "POST",
        "/api/v1/reservations",
        Some(json!({"tags": ["ci", "linux"], "quantity": 1, "max_wait_time": 600})),
    )
    .await;
    let id = payload["reservation_id"].as_str().expect("id").to_string();

    let (status, _) = send(&app, "DELETE", &format!("/api/v1/reservations/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &format!("/api/v1/reservations/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reservation_validation_maps_to_wire_statuses() {
    let (_, app) = test_app(vec![
        Resource::new(ResourceId(1), "linux-1").with_tags("ci,linux"),
    ]);

    // No resource matches the tags at all.
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/reservations",
        Some(json!({"tags": ["ci", "windows"], "quantity": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Empty tag set.
    let (status, payload) = send(
        &app,
        "POST",
        "/api/v1/reservations",
        Some(json!({"tags": [], "quantity": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["code"], "INVALID_RESERVATION_TAGS");

    // Zero quantity.
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/reservations",
        Some(json!({"tags": ["ci"], "quantity": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn legacy_prefix_serves_with_deprecation_header() {
    let (_, app) = test_app(vec![Resource::new(ResourceId(1), "r")]);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/rentabot/api/v1.0/resources")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("Deprecation")
            .and_then(|v| v.to_str().ok()),
        Some("true")
    );
}

#[tokio::test]
async fn legacy_prefix_redirects_when_configured() {
    let catalog = Arc::new(Catalog::from_resources(vec![Resource::new(
        ResourceId(1),
        "r",
    )]));
    let config = ApiConfig {
        legacy_redirect: true,
        ..ApiConfig::default()
    };
    let app = create_api_router(AppState::new(catalog), &config);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/rentabot/api/v1.0/resources/1")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok()),
        Some("/api/v1/resources/1")
    );
}

#[tokio::test]
async fn health_and_openapi_endpoints_respond() {
    let (_, app) = test_app(vec![Resource::new(ResourceId(1), "r")]);

    let (status, payload) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["status"], "ok");

    let (status, payload) = send(&app, "GET", "/readiness", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["resources"], 1);

    let (status, payload) = send(&app, "GET", "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(payload["paths"].is_object());
}
