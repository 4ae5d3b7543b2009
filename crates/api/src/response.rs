//! API response types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use warden_core::{ActionOutcome, Degradation};

/// Standard API response wrapper.
///
/// Errors are rendered by `AppError`; this type only carries successes.
/// `degraded` lists follow-up steps of a committed action that did not
/// complete.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<Degradation>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a success response.
    pub const fn ok(data: T) -> Self {
        Self {
            data,
            degraded: Vec::new(),
        }
    }

    /// Create a response for a moderation action, converting its value.
    pub fn from_outcome<U>(outcome: ActionOutcome<U>) -> Self
    where
        U: Into<T>,
    {
        Self {
            data: outcome.value.into(),
            degraded: outcome.degraded,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}
