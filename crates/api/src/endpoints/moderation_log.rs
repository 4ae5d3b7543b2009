//! Moderation log endpoints.

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use warden_common::AppResult;
use warden_db::{
    entities::moderation_log::{self, ModerationAction},
    repositories::ModerationLogFilter,
};

use crate::{extractors::AuthActor, middleware::AppState, response::ApiResponse};

use super::{MAX_LIMIT, default_limit};

/// Log entry response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntryResponse {
    pub id: String,
    pub moderator_id: String,
    pub action: ModerationAction,
    pub target_user_id: Option<String>,
    pub target_post_id: Option<String>,
    pub target_thread_id: Option<String>,
    pub reason: Option<String>,
    pub details: serde_json::Value,
    pub created_at: String,
}

impl From<moderation_log::Model> for LogEntryResponse {
    fn from(e: moderation_log::Model) -> Self {
        Self {
            id: e.id,
            moderator_id: e.moderator_id,
            action: e.action,
            target_user_id: e.target_user_id,
            target_post_id: e.target_post_id,
            target_thread_id: e.target_thread_id,
            reason: e.reason,
            details: e.details,
            created_at: e.created_at.to_rfc3339(),
        }
    }
}

/// List log entries request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLogRequest {
    pub moderator_id: Option<String>,
    pub target_user_id: Option<String>,
    pub action: Option<ModerationAction>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

/// List log entries, newest first.
async fn list(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(req): Json<ListLogRequest>,
) -> AppResult<ApiResponse<Vec<LogEntryResponse>>> {
    let filter = ModerationLogFilter {
        moderator_id: req.moderator_id,
        target_user_id: req.target_user_id,
        action: req.action,
    };
    let entries = state
        .audit_log
        .list(&actor, filter, req.limit.min(MAX_LIMIT), req.offset)
        .await?;

    Ok(ApiResponse::ok(entries.into_iter().map(Into::into).collect()))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/list", post(list))
}
