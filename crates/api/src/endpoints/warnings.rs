//! Warning endpoints.

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use warden_common::AppResult;
use warden_core::{EditWarningInput, WarnInput};
use warden_db::entities::warning;

use crate::{extractors::AuthActor, middleware::AppState, response::ApiResponse};

// ==================== Request/Response Types ====================

/// Warning response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningResponse {
    pub id: String,
    pub user_id: String,
    pub issued_by: String,
    pub reason: String,
    pub description: Option<String>,
    pub points: i32,
    pub is_active: bool,
    pub expires_at: String,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<warning::Model> for WarningResponse {
    fn from(w: warning::Model) -> Self {
        Self {
            id: w.id,
            user_id: w.user_id,
            issued_by: w.issued_by,
            reason: w.reason,
            description: w.description,
            points: w.points,
            is_active: w.is_active,
            expires_at: w.expires_at.to_rfc3339(),
            created_at: w.created_at.to_rfc3339(),
            updated_at: w.updated_at.map(|dt| dt.to_rfc3339()),
        }
    }
}

/// Active warnings of a user with their point total.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWarningsResponse {
    pub user_id: String,
    pub points: i64,
    pub warnings: Vec<WarningResponse>,
}

/// Request naming a single warning.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningIdRequest {
    pub warning_id: String,
}

/// List warnings request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListWarningsRequest {
    pub user_id: String,
}

// ==================== Handlers ====================

/// Warn a user.
async fn create(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(input): Json<WarnInput>,
) -> AppResult<ApiResponse<WarningResponse>> {
    let outcome = state.lifecycle_service.warn(&actor, input).await?;
    Ok(ApiResponse::from_outcome(outcome))
}

/// Edit the reason or description of a warning.
async fn update(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(input): Json<EditWarningInput>,
) -> AppResult<ApiResponse<WarningResponse>> {
    let outcome = state.lifecycle_service.edit_warning(&actor, input).await?;
    Ok(ApiResponse::from_outcome(outcome))
}

/// Remove a warning.
async fn delete(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(req): Json<WarningIdRequest>,
) -> AppResult<ApiResponse<WarningResponse>> {
    let outcome = state
        .lifecycle_service
        .delete_warning(&actor, &req.warning_id)
        .await?;
    Ok(ApiResponse::from_outcome(outcome))
}

/// Active warnings of a user.
async fn list(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(req): Json<ListWarningsRequest>,
) -> AppResult<ApiResponse<UserWarningsResponse>> {
    let warnings = state
        .lifecycle_service
        .list_active_warnings_for_user(&actor, &req.user_id)
        .await?;
    let points = state
        .lifecycle_service
        .warning_points(&actor, &req.user_id)
        .await?;

    Ok(ApiResponse::ok(UserWarningsResponse {
        user_id: req.user_id,
        points,
        warnings: warnings.into_iter().map(Into::into).collect(),
    }))
}

// ==================== Router ====================

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/update", post(update))
        .route("/delete", post(delete))
        .route("/list", post(list))
}
