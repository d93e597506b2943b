//! Error types for playback control, sessions and the HTTP catalogue.
//!
//! [`PlaybackError`] and [`SessionError`] are reported to the client as
//! `error` frames carrying a stable code; they never close a session.
//! [`ApiError`] implements `axum::response::IntoResponse` for the HTTP routes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dbviz_core::OperationError;
use serde::Serialize;
use uuid::Uuid;

/// Invalid playback state-machine transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("no trace loaded; start an operation first")]
    NotInitialized,

    #[error("already at the last step")]
    NoMoreSteps,

    #[error("already before the first step")]
    NoPreviousSteps,

    #[error("playback is already running")]
    AlreadyPlaying,
}

impl PlaybackError {
    pub fn code(&self) -> &'static str {
        match self {
            PlaybackError::NotInitialized => "not_initialized",
            PlaybackError::NoMoreSteps => "no_more_steps",
            PlaybackError::NoPreviousSteps => "no_previous_steps",
            PlaybackError::AlreadyPlaying => "already_playing",
        }
    }
}

/// Errors raised while routing a client frame to its session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    NoSession(Uuid),

    #[error("unknown project '{0}'")]
    UnknownProject(String),

    #[error("invalid {message} payload: {reason}")]
    InvalidPayload { message: String, reason: String },

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error("malformed frame: {0}")]
    Parse(String),

    #[error("unknown message type '{0}'")]
    UnknownMessage(String),
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::NoSession(_) => "no_session",
            SessionError::UnknownProject(_) => "unknown_project",
            SessionError::InvalidPayload { .. } | SessionError::Operation(_) => "invalid_payload",
            SessionError::Playback(err) => err.code(),
            SessionError::Parse(_) => "parse_error",
            SessionError::UnknownMessage(_) => "unknown_message",
        }
    }
}

/// Structured error detail in API responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unknown scenario or project (404).
    #[error("not found: {0}")]
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ApiErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message: msg.clone(),
                },
            ),
        };

        let body = serde_json::json!({
            "success": false,
            "error": detail,
        });

        (status, axum::Json(body)).into_response()
    }
}
