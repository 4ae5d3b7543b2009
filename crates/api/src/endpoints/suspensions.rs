//! Suspension endpoints.

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use warden_common::AppResult;
use warden_core::{EditSuspensionInput, SuspendInput, SuspensionView};
use warden_db::entities::suspension::{self, SuspensionKind, SuspensionStatus};

use crate::{extractors::AuthActor, middleware::AppState, response::ApiResponse};

use super::{MAX_LIMIT, default_limit};

// ==================== Request/Response Types ====================

/// Suspension response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspensionResponse {
    pub id: String,
    pub user_id: String,
    pub issued_by: String,
    pub reason: String,
    pub description: Option<String>,
    pub kind: SuspensionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SuspensionStatus>,
    pub is_active: bool,
    pub starts_at: String,
    pub expires_at: Option<String>,
    pub lifted_at: Option<String>,
    pub lifted_by: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<suspension::Model> for SuspensionResponse {
    fn from(s: suspension::Model) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            issued_by: s.issued_by,
            reason: s.reason,
            description: s.description,
            kind: s.kind,
            status: None,
            is_active: s.is_active,
            starts_at: s.starts_at.to_rfc3339(),
            expires_at: s.expires_at.map(|dt| dt.to_rfc3339()),
            lifted_at: s.lifted_at.map(|dt| dt.to_rfc3339()),
            lifted_by: s.lifted_by,
            created_at: s.created_at.to_rfc3339(),
            updated_at: s.updated_at.map(|dt| dt.to_rfc3339()),
        }
    }
}

impl From<SuspensionView> for SuspensionResponse {
    fn from(view: SuspensionView) -> Self {
        Self {
            status: Some(view.status),
            ..Self::from(view.suspension)
        }
    }
}

/// Request naming a single suspension.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspensionIdRequest {
    pub suspension_id: String,
}

/// List suspensions request. With `userId`, the user's full history;
/// otherwise every suspension in effect now.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSuspensionsRequest {
    pub user_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

// ==================== Handlers ====================

/// Suspend a user.
async fn create(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(input): Json<SuspendInput>,
) -> AppResult<ApiResponse<SuspensionResponse>> {
    let outcome = state.lifecycle_service.suspend(&actor, input).await?;
    Ok(ApiResponse::from_outcome(outcome))
}

/// Lift a suspension early.
async fn lift(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(req): Json<SuspensionIdRequest>,
) -> AppResult<ApiResponse<SuspensionResponse>> {
    let outcome = state
        .lifecycle_service
        .lift_suspension(&actor, &req.suspension_id)
        .await?;
    Ok(ApiResponse::from_outcome(outcome))
}

/// Remove a suspension record entirely.
async fn delete(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(req): Json<SuspensionIdRequest>,
) -> AppResult<ApiResponse<SuspensionResponse>> {
    let outcome = state
        .lifecycle_service
        .delete_suspension(&actor, &req.suspension_id)
        .await?;
    Ok(ApiResponse::from_outcome(outcome))
}

/// Edit the reason or description of a suspension.
async fn update(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(input): Json<EditSuspensionInput>,
) -> AppResult<ApiResponse<SuspensionResponse>> {
    let outcome = state.lifecycle_service.edit_suspension(&actor, input).await?;
    Ok(ApiResponse::from_outcome(outcome))
}

/// Show a suspension.
async fn show(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(req): Json<SuspensionIdRequest>,
) -> AppResult<ApiResponse<SuspensionResponse>> {
    let view = state
        .lifecycle_service
        .get_suspension(&actor, &req.suspension_id)
        .await?;
    Ok(ApiResponse::ok(view.into()))
}

/// List suspensions.
async fn list(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(req): Json<ListSuspensionsRequest>,
) -> AppResult<ApiResponse<Vec<SuspensionResponse>>> {
    let views = match req.user_id {
        Some(user_id) => {
            state
                .lifecycle_service
                .list_suspensions_for_user(&actor, &user_id)
                .await?
        }
        None => {
            state
                .lifecycle_service
                .list_active_suspensions(&actor, req.limit.min(MAX_LIMIT), req.offset)
                .await?
        }
    };

    Ok(ApiResponse::ok(views.into_iter().map(Into::into).collect()))
}

// ==================== Router ====================

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/lift", post(lift))
        .route("/delete", post(delete))
        .route("/update", post(update))
        .route("/show", post(show))
        .route("/list", post(list))
}
