//! Request extractors.

use axum::{extract::FromRequestParts, http::request::Parts};
use warden_common::AppError;
use warden_core::Actor;

/// Authenticated actor extractor.
#[derive(Debug, Clone)]
pub struct AuthActor(pub Actor);

impl<S> FromRequestParts<S> for AuthActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by actor middleware
        parts
            .extensions
            .get::<Actor>()
            .cloned()
            .map(AuthActor)
            .ok_or(AppError::Unauthorized)
    }
}
