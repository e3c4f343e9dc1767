use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{SmileLogId, SmileSubmission, UserId};
use super::repository::{SmileRepository, VisionError, VisionFacility};
use super::service::{SmileService, SmileServiceError};

/// Header carrying the identity the upstream identity provider authenticated.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Headroom past the vision timeout for the gate re-check and the commit.
const SUBMIT_GRACE: Duration = Duration::from_millis(500);

/// Accepts both `{ "journal_entry": .. }` and `{ "smile_log": { "journal_entry": .. } }`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct JournalUpdate {
    #[serde(default)]
    pub(crate) journal_entry: Option<String>,
    #[serde(default)]
    pub(crate) smile_log: Option<JournalFields>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct JournalFields {
    #[serde(default)]
    pub(crate) journal_entry: Option<String>,
}

impl JournalUpdate {
    fn into_entry(self) -> Option<String> {
        match self.smile_log {
            Some(nested) => nested.journal_entry,
            None => self.journal_entry,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RankingParams {
    #[serde(rename = "type")]
    pub(crate) mode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchParams {
    #[serde(default)]
    pub(crate) query: String,
}

/// Router builder exposing smile submission, ranking and profile endpoints.
pub fn smile_router<R, V>(service: Arc<SmileService<R, V>>) -> Router
where
    R: SmileRepository + 'static,
    V: VisionFacility + 'static,
{
    Router::new()
        .route("/api/v1/smile_logs", post(submit_handler::<R, V>))
        .route(
            "/api/v1/smile_logs/:log_id",
            get(detail_handler::<R, V>)
                .patch(journal_handler::<R, V>)
                .put(journal_handler::<R, V>),
        )
        .route("/api/v1/rankings", get(ranking_handler::<R, V>))
        .route("/api/v1/mypage", get(profile_handler::<R, V>))
        .route("/api/v1/users/search", get(search_handler::<R, V>))
        .with_state(service)
}

pub(crate) async fn submit_handler<R, V>(
    State(service): State<Arc<SmileService<R, V>>>,
    headers: HeaderMap,
    axum::Json(submission): axum::Json<SmileSubmission>,
) -> Response
where
    R: SmileRepository + 'static,
    V: VisionFacility + 'static,
{
    let Some(user_id) = caller(&headers) else {
        return unauthenticated();
    };

    // The vision call blocks, so keep it off the async workers. The service discards a
    // detection that arrives after the vision timeout, so a late worker never commits.
    let vision_timeout = service.vision_timeout();
    let task = tokio::task::spawn_blocking(move || {
        service.submit(&user_id, submission, Utc::now())
    });

    match tokio::time::timeout(vision_timeout + SUBMIT_GRACE, task).await {
        Ok(Ok(Ok(receipt))) => (StatusCode::CREATED, axum::Json(receipt)).into_response(),
        Ok(Ok(Err(err))) => service_error(err),
        Err(_elapsed) => service_error(SmileServiceError::TransientAnalysisFailure(
            VisionError::Timeout(vision_timeout),
        )),
        Ok(Err(join_error)) => {
            error!(error = %join_error, "smile submission task failed");
            let payload = json!({ "error": "submission could not be processed" });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn detail_handler<R, V>(
    State(service): State<Arc<SmileService<R, V>>>,
    headers: HeaderMap,
    Path(log_id): Path<String>,
) -> Response
where
    R: SmileRepository + 'static,
    V: VisionFacility + 'static,
{
    let Some(user_id) = caller(&headers) else {
        return unauthenticated();
    };

    match service.smile_log(&user_id, &SmileLogId(log_id)) {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn journal_handler<R, V>(
    State(service): State<Arc<SmileService<R, V>>>,
    headers: HeaderMap,
    Path(log_id): Path<String>,
    axum::Json(update): axum::Json<JournalUpdate>,
) -> Response
where
    R: SmileRepository + 'static,
    V: VisionFacility + 'static,
{
    let Some(user_id) = caller(&headers) else {
        return unauthenticated();
    };

    match service.edit_journal_entry(&user_id, &SmileLogId(log_id), update.into_entry()) {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn ranking_handler<R, V>(
    State(service): State<Arc<SmileService<R, V>>>,
    headers: HeaderMap,
    Query(params): Query<RankingParams>,
) -> Response
where
    R: SmileRepository + 'static,
    V: VisionFacility + 'static,
{
    let Some(user_id) = caller(&headers) else {
        return unauthenticated();
    };

    match service.ranking_for(&user_id, params.mode.as_deref(), Utc::now()) {
        Ok(entries) => (StatusCode::OK, axum::Json(entries)).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn profile_handler<R, V>(
    State(service): State<Arc<SmileService<R, V>>>,
    headers: HeaderMap,
) -> Response
where
    R: SmileRepository + 'static,
    V: VisionFacility + 'static,
{
    let Some(user_id) = caller(&headers) else {
        return unauthenticated();
    };

    match service.profile(&user_id, Utc::now()) {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn search_handler<R, V>(
    State(service): State<Arc<SmileService<R, V>>>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Response
where
    R: SmileRepository + 'static,
    V: VisionFacility + 'static,
{
    let Some(user_id) = caller(&headers) else {
        return unauthenticated();
    };

    match service.search_users(&user_id, &params.query) {
        Ok(matches) => (StatusCode::OK, axum::Json(matches)).into_response(),
        Err(err) => service_error(err),
    }
}

fn caller(headers: &HeaderMap) -> Option<UserId> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| UserId(value.to_string()))
}

fn unauthenticated() -> Response {
    let payload = json!({
        "error": "missing authenticated user",
        "code": "unauthenticated",
    });
    (StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response()
}

fn service_error(err: SmileServiceError) -> Response {
    let status = err.status_code();
    if status.is_server_error() {
        error!(error = %err, code = err.code(), "smile request failed");
    }
    let payload = json!({
        "error": err.to_string(),
        "code": err.code(),
    });
    (status, axum::Json(payload)).into_response()
}
