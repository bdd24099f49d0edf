//! HTTP API handlers.

use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bazaar_core::{ConfirmationView, RedirectContext};
use serde::Serialize;
use std::sync::Arc;
use url::form_urlencoded;
use uuid::Uuid;

use crate::state::{AppState, AttemptError, SessionId};

// ============ Errors ============

/// Handler error, rendered as `{"error": ...}`
#[derive(Debug)]
pub enum AppError {
    SessionNotFound,
    AttemptInProgress,
    AttemptAborted,
}

impl From<AttemptError> for AppError {
    fn from(err: AttemptError) -> Self {
        match err {
            AttemptError::InProgress => AppError::AttemptInProgress,
            AttemptError::Aborted(e) => {
                tracing::error!(error = %e, "confirmation task aborted");
                AppError::AttemptAborted
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::SessionNotFound => (StatusCode::NOT_FOUND, "Session not found"),
            AppError::AttemptInProgress => (
                StatusCode::CONFLICT,
                "A confirmation attempt is already in progress",
            ),
            AppError::AttemptAborted => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "The confirmation attempt stopped unexpectedly",
            ),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

// ============ Response types ============

#[derive(Serialize)]
pub struct ConfirmationResponse {
    pub session_id: SessionId,
    #[serde(flatten)]
    pub view: ConfirmationView,
}

/// `diagnostics=1|true|yes|on` turns the diagnostics panel on
fn diagnostics_requested(query: Option<&str>) -> bool {
    query
        .map(|q| {
            form_urlencoded::parse(q.as_bytes()).any(|(key, value)| {
                key == "diagnostics"
                    && matches!(value.as_ref(), "1" | "true" | "yes" | "on")
            })
        })
        .unwrap_or(false)
}

// ============ Confirmation handlers ============

/// Page load from the payment provider redirect
pub async fn confirm_payment(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<ConfirmationResponse>, AppError> {
    let redirect = RedirectContext::from_query(query.as_deref().unwrap_or_default());
    let show_diagnostics = diagnostics_requested(query.as_deref());

    let (session_id, session) = state.open_session(redirect);
    tracing::info!(%session_id, tx_ref = ?session.redirect.tx_ref, "payment redirect received");

    let view = Arc::clone(&session).run(show_diagnostics).await?;
    tracing::info!(%session_id, status = ?view.status, "payment confirmation finished");

    Ok(Json(ConfirmationResponse { session_id, view }))
}

pub async fn get_confirmation(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    RawQuery(query): RawQuery,
) -> Result<Json<ConfirmationResponse>, AppError> {
    let session_id = SessionId(session_id);
    let session = state.session(session_id).ok_or(AppError::SessionNotFound)?;
    let view = session.view(diagnostics_requested(query.as_deref()));
    Ok(Json(ConfirmationResponse { session_id, view }))
}

pub async fn retry_confirmation(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    RawQuery(query): RawQuery,
) -> Result<Json<ConfirmationResponse>, AppError> {
    let session_id = SessionId(session_id);
    let session = state.session(session_id).ok_or(AppError::SessionNotFound)?;

    let view = session
        .retry(diagnostics_requested(query.as_deref()))
        .await
        .inspect_err(|e| tracing::warn!(%session_id, error = %e, "retry rejected"))?;

    Ok(Json(ConfirmationResponse { session_id, view }))
}

pub async fn health() -> &'static str {
    "ok"
}
