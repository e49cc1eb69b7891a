//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use op_authorizer::AuthorizerError;
use serde::Serialize;

/// Body returned for all engine errors
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    /// Present only for rate-limit errors, for UI countdowns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_ms: Option<u64>,
}

/// Engine error as an HTTP response
///
/// `NotFound` -> 404, `InvalidTransition` -> 409, `RateLimited` -> 429
/// with the remaining cooldown attached.
#[derive(Debug)]
pub struct ApiError(pub AuthorizerError);

impl From<AuthorizerError> for ApiError {
    fn from(err: AuthorizerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, remaining_ms) = match &self.0 {
            AuthorizerError::NotFound { .. } => (StatusCode::NOT_FOUND, None),
            AuthorizerError::InvalidTransition { .. } => (StatusCode::CONFLICT, None),
            AuthorizerError::RateLimited { remaining_ms } => {
                (StatusCode::TOO_MANY_REQUESTS, Some(*remaining_ms))
            }
        };

        let body = ErrorBody {
            error: self.0.to_string(),
            remaining_ms,
        };
        (status, Json(body)).into_response()
    }
}
