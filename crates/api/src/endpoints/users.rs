//! User trust state endpoints.

use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;
use warden_common::{AppError, AppResult};
use warden_core::TrustStateView;

use crate::{extractors::AuthActor, middleware::AppState, response::ApiResponse};

/// Trust state request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustStateRequest {
    pub user_id: String,
}

/// Whether a user is blocked, with the synchronized columns behind it.
/// Staff may look up anyone; other users only themselves.
async fn trust_state(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(req): Json<TrustStateRequest>,
) -> AppResult<ApiResponse<TrustStateView>> {
    if !actor.is_staff() && actor.id != req.user_id {
        return Err(AppError::Forbidden(
            "Cannot view another user's trust state".to_string(),
        ));
    }

    let view = state.trust_state.view(&req.user_id).await?;
    Ok(ApiResponse::ok(view))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/trust-state", post(trust_state))
}
