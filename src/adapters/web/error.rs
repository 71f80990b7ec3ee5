//! JSON error responses for the web adapter.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::error::TraderError;

#[derive(Debug)]
pub struct WebError {
    pub status: StatusCode,
    pub message: String,
}

impl WebError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

pub fn status_from_error(err: &TraderError) -> StatusCode {
    match err {
        TraderError::ResetNotConfirmed { .. } => StatusCode::BAD_REQUEST,
        TraderError::ConfigMissing { .. }
        | TraderError::ConfigInvalid { .. }
        | TraderError::ConfigParse { .. } => StatusCode::BAD_REQUEST,
        TraderError::Halted { .. } | TraderError::Integrity { .. } => StatusCode::CONFLICT,
        TraderError::Collaborator { .. } => StatusCode::SERVICE_UNAVAILABLE,
        TraderError::Database { .. } | TraderError::DatabaseQuery { .. } | TraderError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<TraderError> for WebError {
    fn from(err: TraderError) -> Self {
        let status = status_from_error(&err);
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "ok": false, "error": self.message }));
        (self.status, body).into_response()
    }
}
