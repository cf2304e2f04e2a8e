//! REST API routes for the approval engine.
//!
//! Thin handlers over [`ApprovalEngine`]. The caller is identified by the
//! `x-reviewer-id` header; every route requires it.

use crate::error::AppError;
use crate::models::{ArtifactStatus, Vote, VoteWithReviewer};
use crate::services::engine::{ApprovalEngine, NotificationFeed};
use crate::services::registry::DecisionOutcome;
use crate::services::rounds::RoundOutcome;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Request, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Header carrying the authenticated reviewer's user ID.
pub const CALLER_HEADER: &str = "x-reviewer-id";

/// Shared state for the API routes.
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<ApprovalEngine>,
}

// ── Error handling ───────────────────────────────────────────────────────────

/// JSON error body.
#[derive(Serialize)]
struct ApiError {
    code: String,
    message: String,
}

/// Wrapper to make AppError usable as an axum error response.
pub struct ApiErr(pub AppError);

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            log::error!("[api] {}", self.0);
        }

        (
            status,
            Json(ApiError {
                code: self.0.code().to_string(),
                message: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<AppError> for ApiErr {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

// ── Caller identity ──────────────────────────────────────────────────────────

/// Authenticated caller, taken from the `x-reviewer-id` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub i64);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(CALLER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
            .map(Caller)
            .ok_or_else(|| ApiErr(AppError::unauthorized("Missing or invalid x-reviewer-id header")))
    }
}

// ── Input extractors ─────────────────────────────────────────────────────────

/// `Json` whose rejections become `InvalidInput` errors with the usual body.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiErr;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiErr(AppError::invalid_input(rejection.body_text()))),
        }
    }
}

/// `Path` whose rejections become `InvalidInput` errors.
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    Path<T>: FromRequestParts<S, Rejection = PathRejection>,
    S: Send + Sync,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiErr(AppError::invalid_input(rejection.body_text()))),
        }
    }
}

// ── Request / response bodies ────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoundRequest {
    reviewer_ids: Vec<i64>,
}

#[derive(Deserialize)]
struct VoteRequest {
    status: String,
    comment: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkReadRequest {
    notification_id: Option<i64>,
    #[serde(default)]
    mark_all_read: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    artifact_id: i64,
    status: ArtifactStatus,
}

#[derive(Serialize)]
struct MarkReadResponse {
    success: bool,
    updated: u64,
}

// ── Route builder ────────────────────────────────────────────────────────────

/// Approval and notification routes, without state or middleware.
pub fn api_routes() -> Router<ApiState> {
    Router::new()
        .route("/api/artifacts/{id}/votes", get(list_votes))
        .route("/api/artifacts/{id}/rounds", post(issue_round))
        .route("/api/artifacts/{id}/decisions", post(record_decision))
        .route("/api/artifacts/{id}/status", get(artifact_status))
        .route("/api/votes/{id}", patch(update_vote))
        .route(
            "/api/notifications",
            get(list_notifications).patch(mark_notifications_read),
        )
}

/// Full application router with tracing and a per-request timeout.
pub fn router(engine: Arc<ApprovalEngine>, request_timeout: Duration) -> Router {
    api_routes()
        .with_state(ApiState { engine })
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /api/artifacts/{id}/votes: all votes, newest first.
async fn list_votes(
    State(state): State<ApiState>,
    Caller(_): Caller,
    ApiPath(artifact_id): ApiPath<i64>,
) -> Result<Json<Vec<VoteWithReviewer>>, ApiErr> {
    Ok(Json(state.engine.list_votes(artifact_id).await?))
}

/// POST /api/artifacts/{id}/rounds: issue a new approval round.
async fn issue_round(
    State(state): State<ApiState>,
    Caller(caller): Caller,
    ApiPath(artifact_id): ApiPath<i64>,
    ApiJson(body): ApiJson<RoundRequest>,
) -> Result<(StatusCode, Json<RoundOutcome>), ApiErr> {
    let outcome = state
        .engine
        .issue_approval_round(artifact_id, &body.reviewer_ids, Some(caller))
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// POST /api/artifacts/{id}/decisions: the caller's single decision.
async fn record_decision(
    State(state): State<ApiState>,
    Caller(caller): Caller,
    ApiPath(artifact_id): ApiPath<i64>,
    ApiJson(body): ApiJson<VoteRequest>,
) -> Result<(StatusCode, Json<DecisionOutcome>), ApiErr> {
    let outcome = state
        .engine
        .record_decision(artifact_id, caller, &body.status, body.comment)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn artifact_status(
    State(state): State<ApiState>,
    Caller(_): Caller,
    ApiPath(artifact_id): ApiPath<i64>,
) -> Result<Json<StatusResponse>, ApiErr> {
    let status = state.engine.artifact_status(artifact_id).await?;
    Ok(Json(StatusResponse { artifact_id, status }))
}

/// PATCH /api/votes/{id}: change the caller's own round vote.
async fn update_vote(
    State(state): State<ApiState>,
    Caller(caller): Caller,
    ApiPath(vote_id): ApiPath<i64>,
    ApiJson(body): ApiJson<VoteRequest>,
) -> Result<Json<Vote>, ApiErr> {
    let vote = state
        .engine
        .cast_or_update_vote(vote_id, caller, &body.status, body.comment)
        .await?;
    Ok(Json(vote))
}

async fn list_notifications(
    State(state): State<ApiState>,
    Caller(caller): Caller,
) -> Result<Json<NotificationFeed>, ApiErr> {
    Ok(Json(state.engine.notifications(caller).await?))
}

/// PATCH /api/notifications: mark one or all of the caller's notifications read.
async fn mark_notifications_read(
    State(state): State<ApiState>,
    Caller(caller): Caller,
    ApiJson(body): ApiJson<MarkReadRequest>,
) -> Result<Json<MarkReadResponse>, ApiErr> {
    let updated = if body.mark_all_read {
        state.engine.mark_all_notifications_read(caller).await?
    } else if let Some(id) = body.notification_id {
        state.engine.mark_notification_read(caller, id).await?;
        1
    } else {
        return Err(ApiErr(AppError::invalid_input(
            "Either notificationId or markAllRead is required",
        )));
    };

    Ok(Json(MarkReadResponse {
        success: true,
        updated,
    }))
}
