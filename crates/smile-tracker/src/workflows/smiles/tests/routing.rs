use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::smiles::memory::InMemorySmileStore;
use crate::workflows::smiles::repository::VisionError;
use crate::workflows::smiles::router::{smile_router, USER_ID_HEADER};
use crate::workflows::smiles::service::SmileService;

fn router_for(store: &InMemorySmileStore, vision: ScriptedVision) -> Router {
    let (service, _) = build_service(store, vision);
    smile_router(Arc::new(service))
}

fn json_request(method: &str, uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user);
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).expect("encode body")))
        .expect("request")
}

fn get_request(uri: &str, user: &str) -> Request<Body> {
    Request::get(uri)
        .header(USER_ID_HEADER, user)
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn submit_route_returns_created_receipt() {
    let store = store();
    seed_user(&store, "u-ana", "Ana", 0);
    let router = router_for(&store, ScriptedVision::detecting(beaming_face()));

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/smile_logs",
            Some("u-ana"),
            json!({ "image": "uploads/ana.jpg", "journal_entry": "Good day" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["overall_score"], json!(97));
    assert_eq!(payload["total_score"], json!(97));
    assert_eq!(payload["log"]["journal_entry"], json!("Good day"));
    assert!(payload["feedback"].is_string());
}

#[tokio::test]
async fn submit_route_requires_identity() {
    let store = store();
    seed_user(&store, "u-ana", "Ana", 0);
    let router = router_for(&store, ScriptedVision::detecting(beaming_face()));

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/smile_logs",
            None,
            json!({ "image": "uploads/ana.jpg" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["code"], json!("unauthenticated"));
    assert_eq!(store.log_count().expect("count"), 0);
}

#[tokio::test]
async fn submit_handler_maps_refusals_to_status_codes() {
    let cases = [
        (
            ScriptedVision::answering(Ok(None)),
            json!({ "image": "uploads/cat.jpg" }),
            StatusCode::UNPROCESSABLE_ENTITY,
            "face_not_detected",
        ),
        (
            ScriptedVision::answering(Err(VisionError::Transport("reset".to_string()))),
            json!({ "image": "uploads/ana.jpg" }),
            StatusCode::SERVICE_UNAVAILABLE,
            "analysis_unavailable",
        ),
        (
            ScriptedVision::detecting(beaming_face()),
            json!({ "journal_entry": "forgot the photo" }),
            StatusCode::BAD_REQUEST,
            "missing_image",
        ),
    ];

    for (vision, body, status, code) in cases {
        let store = store();
        seed_user(&store, "u-ana", "Ana", 0);
        let (service, _) = build_service(&store, vision);
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u-ana"));

        let response = crate::workflows::smiles::router::submit_handler::<
            InMemorySmileStore,
            ScriptedVision,
        >(
            State(Arc::new(service)),
            headers,
            axum::Json(serde_json::from_value(body).expect("submission payload")),
        )
        .await;

        assert_eq!(response.status(), status);
        let payload = read_json_body(response).await;
        assert_eq!(payload["code"], json!(code));
    }
}

#[tokio::test]
async fn second_submit_returns_conflict() {
    let store = store();
    seed_user(&store, "u-ana", "Ana", 0);
    seed_log(&store, "smile-today", "u-ana", chrono::Utc::now(), 80);
    let router = router_for(&store, ScriptedVision::detecting(beaming_face()));

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/smile_logs",
            Some("u-ana"),
            json!({ "image": "uploads/ana.jpg" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert_eq!(payload["code"], json!("daily_limit_reached"));
}

#[tokio::test]
async fn journal_route_enforces_ownership() {
    let store = store();
    seed_user(&store, "u-ana", "Ana", 0);
    seed_user(&store, "u-ben", "Ben", 0);
    seed_log(&store, "smile-ana", "u-ana", now(), 80);
    let router = router_for(&store, ScriptedVision::detecting(beaming_face()));

    let response = router
        .clone()
        .oneshot(json_request(
            "PATCH",
            "/api/v1/smile_logs/smile-ana",
            Some("u-ben"),
            json!({ "journal_entry": "hijacked" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router
        .clone()
        .oneshot(json_request(
            "PATCH",
            "/api/v1/smile_logs/smile-ana",
            Some("u-ana"),
            json!({ "journal_entry": "Lunch in the park" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["journal_entry"], json!("Lunch in the park"));

    let response = router
        .oneshot(json_request(
            "PATCH",
            "/api/v1/smile_logs/smile-nope",
            Some("u-ana"),
            json!({ "journal_entry": null }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ranking_route_defaults_to_friends_and_rejects_unknown_types() {
    let store = store();
    seed_user(&store, "u-ana", "Ana", 300);
    seed_user(&store, "u-ben", "Ben", 900);
    seed_user(&store, "u-cal", "Cal", 5000);
    store
        .follow(&user_id("u-ana"), &user_id("u-ben"))
        .expect("follow");
    let router = router_for(&store, ScriptedVision::detecting(beaming_face()));

    let response = router
        .clone()
        .oneshot(get_request("/api/v1/rankings", "u-ana"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let ids: Vec<_> = payload
        .as_array()
        .expect("array payload")
        .iter()
        .map(|entry| entry["id"].as_str().expect("id").to_string())
        .collect();
    assert_eq!(ids, vec!["u-ben", "u-ana"]);
    assert_eq!(payload[1]["is_current_user"], json!(true));
    assert_eq!(payload[0]["rank"], json!(1));

    let response = router
        .clone()
        .oneshot(get_request("/api/v1/rankings?type=all_time", "u-ana"))
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    assert_eq!(payload[0]["id"], json!("u-cal"));
    assert_eq!(payload[0]["smile_rank"]["name"], json!("gold"));

    let response = router
        .oneshot(get_request("/api/v1/rankings?type=bogus", "u-ana"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert_eq!(payload["code"], json!("invalid_ranking_type"));
}

#[tokio::test]
async fn mypage_and_search_routes_return_json() {
    let store = store();
    seed_user(&store, "u-ana", "Ana", 1500);
    seed_user(&store, "u-dana", "Dana", 0);
    seed_log(&store, "smile-1", "u-ana", now(), 70);
    let router = router_for(&store, ScriptedVision::detecting(beaming_face()));

    let response = router
        .clone()
        .oneshot(get_request("/api/v1/mypage", "u-ana"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["nickname"], json!("Ana"));
    assert_eq!(payload["smile_rank"], json!("silver"));
    assert_eq!(payload["smile_logs"][0]["score"], json!(70));

    let response = router
        .clone()
        .oneshot(get_request("/api/v1/mypage", "u-ghost"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .oneshot(get_request("/api/v1/users/search?query=an", "u-ana"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload, json!([{ "id": "u-dana", "nickname": "Dana" }]));
}

#[tokio::test]
async fn store_failures_surface_as_service_unavailable() {
    let inner = store();
    seed_user(&inner, "u-ana", "Ana", 0);
    let service = SmileService::new(
        Arc::new(ReadOnlyStore { inner }),
        Arc::new(ScriptedVision::detecting(beaming_face())),
        scoring_config(),
    );
    let router = smile_router(Arc::new(service));

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/smile_logs",
            Some("u-ana"),
            json!({ "image": "uploads/ana.jpg" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let payload = read_json_body(response).await;
    assert_eq!(payload["code"], json!("store_unavailable"));
}

#[tokio::test]
async fn log_detail_route_checks_ownership() {
    let store = store();
    seed_user(&store, "u-ana", "Ana", 0);
    seed_user(&store, "u-ben", "Ben", 0);
    seed_log(&store, "log-1", "u-ana", now(), 80);
    let router = router_for(&store, ScriptedVision::detecting(beaming_face()));

    let response = router
        .clone()
        .oneshot(get_request("/api/v1/smile_logs/log-1", "u-ana"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["id"], json!("log-1"));
    assert_eq!(payload["overall_score"], json!(80));
    assert_eq!(payload["detail"]["happiness"], json!(80));

    let response = router
        .clone()
        .oneshot(get_request("/api/v1/smile_logs/log-1", "u-ben"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router
        .oneshot(get_request("/api/v1/smile_logs/log-404", "u-ana"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn put_route_accepts_the_nested_journal_body() {
    let store = store();
    seed_user(&store, "u-ana", "Ana", 0);
    seed_log(&store, "log-1", "u-ana", now(), 80);
    let router = router_for(&store, ScriptedVision::detecting(beaming_face()));

    let response = router
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/v1/smile_logs/log-1",
            Some("u-ana"),
            json!({ "smile_log": { "journal_entry": " Picnic with friends " } }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["journal_entry"], json!("Picnic with friends"));

    let response = router
        .oneshot(get_request("/api/v1/smile_logs/log-1", "u-ana"))
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    assert_eq!(payload["journal_entry"], json!("Picnic with friends"));
}

#[tokio::test]
async fn read_routes_reject_unregistered_callers() {
    let store = store();
    seed_user(&store, "u-ana", "Ana", 100);
    let router = router_for(&store, ScriptedVision::detecting(beaming_face()));

    for uri in [
        "/api/v1/rankings?type=all_time",
        "/api/v1/rankings",
        "/api/v1/users/search?query=ana",
    ] {
        let response = router
            .clone()
            .oneshot(get_request(uri, "ghost"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        let payload = read_json_body(response).await;
        assert_eq!(payload["code"], json!("unknown_user"));
    }
}

#[tokio::test]
async fn submit_stops_waiting_on_a_stalled_vision_call() {
    let store = store();
    seed_user(&store, "u-ana", "Ana", 0);
    let vision =
        ScriptedVision::detecting(beaming_face()).with_delay(std::time::Duration::from_secs(2));
    let router = router_for(&store, vision);

    let started = std::time::Instant::now();
    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/smile_logs",
            Some("u-ana"),
            json!({ "image": "uploads/ana.jpg" }),
        ))
        .await
        .expect("route executes");

    assert!(started.elapsed() < std::time::Duration::from_millis(1500));
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let payload = read_json_body(response).await;
    assert_eq!(payload["code"], json!("analysis_unavailable"));
    assert_eq!(store.log_count().expect("count"), 0);
}
