// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HTTP API
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | GET | `/health` | liveness |
//! | POST | `/questions` | submit a question |
//! | POST | `/choices/{id}/outcome` | report an outcome |
//! | POST | `/outcomes/auto-validate` | run auto-validation |
//! | GET | `/stats` | pipeline counters |
//! | GET | `/reports/audit` | audit report (markdown) |
//! | GET | `/reports/effectiveness` | effectiveness report (markdown) |
//! | GET | `/escalations` | pending escalations (queue mode) |
//! | GET | `/escalations/{id}` | one pending escalation |
//! | POST | `/escalations/{id}/approve` | approve a candidate |
//! | POST | `/escalations/{id}/override` | replace a candidate |
//! | POST | `/escalations/{id}/defer` | keep the candidate |

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;
use uuid::Uuid;

use crate::application::question_loop::{
    AutoValidationSummary, LoopError, OutcomeReceipt, QuestionLoop, SubmitResponse,
};
use crate::domain::choice::ChoiceId;
use crate::domain::outcome::{OutcomeReport, OutcomeStatus};
use crate::domain::stats::PipelineStats;
use crate::infrastructure::human_input_service::{HumanInputService, PendingEscalation};

pub struct AppState {
    pub question_loop: Arc<QuestionLoop>,
    pub human_input: Option<Arc<HumanInputService>>,
}

pub fn app(question_loop: Arc<QuestionLoop>, human_input: Option<Arc<HumanInputService>>) -> Router {
    let state = Arc::new(AppState {
        question_loop,
        human_input,
    });

    Router::new()
        .route("/health", get(health))
        .route("/questions", post(submit_question))
        .route("/choices/{id}/outcome", post(report_outcome))
        .route("/outcomes/auto-validate", post(auto_validate))
        .route("/stats", get(stats))
        .route("/reports/audit", get(audit_report))
        .route("/reports/effectiveness", get(effectiveness_report))
        .route("/escalations", get(list_escalations))
        .route("/escalations/{id}", get(get_escalation))
        .route("/escalations/{id}/approve", post(approve_escalation))
        .route("/escalations/{id}/override", post(override_escalation))
        .route("/escalations/{id}/defer", post(defer_escalation))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<LoopError> for ApiError {
    fn from(err: LoopError) -> Self {
        match err {
            LoopError::NotFound(_) => ApiError::NotFound(err.to_string()),
            other => {
                error!(error = %other, "Request failed");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "version": env!("CARGO_PKG_VERSION") }))
}

#[derive(Debug, Deserialize)]
pub struct SubmitQuestionRequest {
    pub question: String,
}

async fn submit_question(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SubmitQuestionRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    if payload.question.trim().is_empty() {
        return Err(ApiError::BadRequest("Question must not be empty".to_string()));
    }
    Ok(Json(state.question_loop.submit_question(&payload.question).await?))
}

#[derive(Debug, Deserialize)]
pub struct ReportOutcomeRequest {
    pub status: String,
    #[serde(default)]
    pub success_signals: Vec<String>,
    #[serde(default)]
    pub failure_signals: Vec<String>,
    #[serde(default)]
    pub feedback: Option<String>,
}

async fn report_outcome(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<ReportOutcomeRequest>,
) -> Result<Json<OutcomeReceipt>, ApiError> {
    let choice_id: ChoiceId = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid choice ID: {id}")))?;
    let status: OutcomeStatus = payload.status.parse().map_err(ApiError::BadRequest)?;

    let mut report = OutcomeReport::manual(status)
        .with_success_signals(payload.success_signals)
        .with_failure_signals(payload.failure_signals);
    if let Some(feedback) = payload.feedback {
        report = report.with_feedback(feedback);
    }

    Ok(Json(state.question_loop.report_outcome(choice_id, report).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct AutoValidateRequest {
    #[serde(default)]
    pub max_age_hours: Option<f64>,
}

async fn auto_validate(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<AutoValidateRequest>>,
) -> Result<Json<AutoValidationSummary>, ApiError> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    if let Some(hours) = request.max_age_hours {
        if !hours.is_finite() || hours <= 0.0 {
            return Err(ApiError::BadRequest(
                "max_age_hours must be a positive number".to_string(),
            ));
        }
    }
    Ok(Json(state.question_loop.auto_validate(request.max_age_hours).await?))
}

async fn stats(State(state): State<Arc<AppState>>) -> Json<PipelineStats> {
    Json(state.question_loop.stats())
}

async fn audit_report(State(state): State<Arc<AppState>>) -> Result<String, ApiError> {
    Ok(state.question_loop.audit_report().await?)
}

async fn effectiveness_report(State(state): State<Arc<AppState>>) -> Result<String, ApiError> {
    Ok(state.question_loop.effectiveness_report().await?)
}

fn queue(state: &AppState) -> Result<&HumanInputService, ApiError> {
    state
        .human_input
        .as_deref()
        .ok_or_else(|| ApiError::Conflict("Escalation queue is not enabled".to_string()))
}

fn parse_request_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::BadRequest(format!("Invalid request ID: {id}")))
}

async fn list_escalations(State(state): State<Arc<AppState>>) -> Result<Json<Vec<PendingEscalation>>, ApiError> {
    Ok(Json(queue(&state)?.list_pending_requests().await))
}

async fn get_escalation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PendingEscalation>, ApiError> {
    let request_id = parse_request_id(&id)?;
    queue(&state)?
        .get_pending_request(request_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Escalation {request_id} not found")))
}

async fn approve_escalation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let request_id = parse_request_id(&id)?;
    queue(&state)?
        .submit_approval(request_id)
        .await
        .map_err(|e| ApiError::NotFound(e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    pub answer: String,
}

async fn override_escalation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<OverrideRequest>,
) -> Result<StatusCode, ApiError> {
    let request_id = parse_request_id(&id)?;
    if payload.answer.trim().is_empty() {
        return Err(ApiError::BadRequest("Answer must not be empty".to_string()));
    }
    queue(&state)?
        .submit_override(request_id, payload.answer)
        .await
        .map_err(|e| ApiError::NotFound(e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn defer_escalation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let request_id = parse_request_id(&id)?;
    queue(&state)?
        .submit_deferral(request_id)
        .await
        .map_err(|e| ApiError::NotFound(e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}
