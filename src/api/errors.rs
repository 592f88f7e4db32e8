//! Error conversion from InterludeError to HTTP responses

use crate::error::InterludeError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// JSON error body returned by every gateway endpoint
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for InterludeError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            InterludeError::SessionNotFound(_) | InterludeError::InvalidSessionId(_) => {
                (StatusCode::NOT_FOUND, "Session not found".to_string())
            }
            InterludeError::AlreadyResolved(_) | InterludeError::SessionResolved(_) => (
                StatusCode::BAD_REQUEST,
                "Session already completed or timed out".to_string(),
            ),
            InterludeError::ComputationFailed(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            InterludeError::Timeout(_) => (StatusCode::GONE, self.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
