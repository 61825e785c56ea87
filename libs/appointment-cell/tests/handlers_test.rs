mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use appointment_cell::handlers::AppointmentState;
use appointment_cell::router::appointment_routes;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

use common::*;

struct TestApp {
    router: Router,
    config: TestConfig,
}

impl TestApp {
    fn new() -> Self {
        let config = TestConfig::default();
        let scheduling = Scheduling::new();

        let state = AppointmentState {
            config: config.to_arc(),
            booking: scheduling.booking.clone(),
            queries: scheduling.queries.clone(),
        };

        Self {
            router: appointment_routes(state),
            config,
        }
    }

    async fn call(&self, method: Method, uri: &str, user: Option<&TestUser>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("Authorization", JwtTestUtils::bearer(user, &self.config));
        }

        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, value)
    }

    async fn book(&self, user: &TestUser, start: &str) -> (StatusCode, Value) {
        self.call(
            Method::POST,
            "/",
            Some(user),
            Some(json!({
                "doctor_id": DOCTOR,
                "clinic_id": CLINIC,
                "patient_id": PATIENT,
                "start_time": start,
                "notes": "First visit"
            })),
        )
        .await
    }
}

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn expired_tokens_are_rejected() {
    let app = TestApp::new();
    let token = JwtTestUtils::create_expired_token(&TestUser::admin(900), &app.config.jwt_secret);

    let request = Request::builder()
        .uri("/")
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn booking_then_overlap_returns_typed_conflict() {
    let app = TestApp::new();
    let patient = TestUser::patient(PATIENT);

    let (status, body) = app.book(&patient, "2026-11-02T10:00:00Z").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["appointment"]["status"], "pending");
    assert_eq!(body["appointment"]["end_time"], "2026-11-02T10:30:00Z");

    let (status, body) = app.book(&patient, "2026-11-02T10:10:00Z").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "SCHEDULING_CONFLICT");
}

#[tokio::test]
async fn listing_is_scoped_and_paginated() {
    let app = TestApp::new();
    app.book(&TestUser::patient(PATIENT), "2026-11-02T10:00:00Z").await;
    app.book(&TestUser::patient(PATIENT), "2026-11-02T11:00:00Z").await;

    let (status, body) = app
        .call(Method::GET, "/?page_size=1&page=2", Some(&TestUser::doctor(DOCTOR)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointments"].as_array().unwrap().len(), 1);
    assert_eq!(body["appointments"][0]["start_time"], "2026-11-02T10:00:00Z");
    assert_eq!(body["pagination"]["total"], 2);
    assert_eq!(body["pagination"]["total_pages"], 2);

    let (_, body) = app
        .call(Method::GET, "/", Some(&TestUser::patient(OTHER_PATIENT)), None)
        .await;
    assert_eq!(body["pagination"]["total"], 0);
}

#[tokio::test]
async fn state_machine_routes_map_errors_to_statuses() {
    let app = TestApp::new();
    let (_, body) = app.book(&TestUser::patient(PATIENT), "2026-11-02T12:00:00Z").await;
    let id = body["appointment"]["id"].as_i64().unwrap();
    let staff = TestUser::clinic_staff(800, CLINIC);

    let (status, body) = app
        .call(Method::POST, &format!("/{}/confirm", id), Some(&TestUser::patient(PATIENT)), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, body) = app.call(Method::POST, &format!("/{}/confirm", id), Some(&staff), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "confirmed");

    let (status, body) = app.call(Method::POST, &format!("/{}/confirm", id), Some(&staff), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "APPOINTMENT_ALREADY_CONFIRMED");

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/{}/cancel", id),
            Some(&staff),
            Some(json!({ "reason": "Clinic closed" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "cancelled");
    assert_eq!(body["appointment"]["notes"], "First visit\nCancelled by clinic: Clinic closed");

    let (status, body) = app.call(Method::POST, &format!("/{}/complete", id), Some(&staff), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "APPOINTMENT_ALREADY_CANCELLED");
}

#[tokio::test]
async fn unknown_or_foreign_appointments_are_not_found() {
    let app = TestApp::new();
    let (_, body) = app.book(&TestUser::patient(PATIENT), "2026-11-02T12:00:00Z").await;
    let id = body["appointment"]["id"].as_i64().unwrap();

    let (status, _) = app.call(Method::GET, "/9999", Some(&TestUser::admin(900)), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .call(Method::GET, &format!("/{}", id), Some(&TestUser::patient(OTHER_PATIENT)), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "APPOINTMENT_NOT_FOUND");
}

#[tokio::test]
async fn late_patient_cancellation_is_a_policy_violation() {
    let app = TestApp::new();
    let (_, body) = app.book(&TestUser::patient(PATIENT), "2026-11-02T08:30:00Z").await;
    let id = body["appointment"]["id"].as_i64().unwrap();

    let (status, body) = app
        .call(Method::POST, &format!("/{}/cancel", id), Some(&TestUser::patient(PATIENT)), Some(json!({})))
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "TOO_LATE_TO_MODIFY");
}

#[tokio::test]
async fn reschedule_and_feedback_routes() {
    let app = TestApp::new();
    let (_, body) = app.book(&TestUser::patient(PATIENT), "2026-11-02T12:00:00Z").await;
    let id = body["appointment"]["id"].as_i64().unwrap();

    let (status, body) = app
        .call(
            Method::PATCH,
            &format!("/{}/reschedule", id),
            Some(&TestUser::patient(PATIENT)),
            Some(json!({ "new_start_time": "2026-11-02T15:00:00Z" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["start_time"], "2026-11-02T15:00:00Z");

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/{}/feedback", id),
            Some(&TestUser::doctor(DOCTOR)),
            Some(json!({ "feedback": "Schedule an extra 15 minutes" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["feedback"], "Schedule an extra 15 minutes");
}

#[tokio::test]
async fn conflict_check_route_reports_overlap() {
    let app = TestApp::new();
    app.book(&TestUser::patient(PATIENT), "2026-11-02T10:00:00Z").await;

    let uri = format!(
        "/conflicts/check?doctor_id={}&clinic_id={}&start_time=2026-11-02T10:15:00Z",
        DOCTOR, CLINIC
    );
    let (status, body) = app.call(Method::GET, &uri, Some(&TestUser::admin(900)), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["has_conflict"], true);
    assert_eq!(body["conflicting_appointments"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn cancel_without_a_body_uses_defaults() {
    let app = TestApp::new();
    let (_, body) = app.book(&TestUser::patient(PATIENT), "2026-11-02T12:00:00Z").await;
    let id = body["appointment"]["id"].as_i64().unwrap();

    let (status, body) = app
        .call(Method::POST, &format!("/{}/cancel", id), Some(&TestUser::patient(PATIENT)), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "cancelled");
}

#[tokio::test]
async fn malformed_input_gets_the_typed_error_body() {
    let app = TestApp::new();
    let admin = TestUser::admin(900);

    let (status, body) = app.call(Method::GET, "/?page=abc", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = app.call(Method::GET, "/not-a-number", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = app
        .call(Method::POST, "/", Some(&admin), Some(json!({ "doctor_id": "one" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/")
        .header("Authorization", JwtTestUtils::bearer(&admin, &app.config))
        .header("Content-Type", "text/plain")
        .body(Body::from("doctor_id=1"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}
