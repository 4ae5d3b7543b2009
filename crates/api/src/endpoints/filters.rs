//! Content filter endpoints.

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use validator::Validate;
use warden_common::AppResult;
use warden_core::{CreateRuleInput, FilterOutcome, SnapshotInfo, UpdateRuleInput};
use warden_db::entities::content_filter_rule::{self, FilterType};

use crate::{extractors::AuthActor, middleware::AppState, response::ApiResponse};

use super::{MAX_LIMIT, default_limit};

// ==================== Request/Response Types ====================

/// Filter rule response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRuleResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    pub pattern: String,
    pub replacement: String,
    pub is_regex: bool,
    pub is_active: bool,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<content_filter_rule::Model> for FilterRuleResponse {
    fn from(r: content_filter_rule::Model) -> Self {
        Self {
            id: r.id,
            filter_type: r.filter_type,
            pattern: r.pattern,
            replacement: r.replacement,
            is_regex: r.is_regex,
            is_active: r.is_active,
            created_by: r.created_by,
            created_at: r.created_at.to_rfc3339(),
            updated_at: r.updated_at.map(|dt| dt.to_rfc3339()),
        }
    }
}

/// Deleted rule response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedRuleResponse {
    pub rule_id: String,
}

/// Request naming a single rule.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleIdRequest {
    pub rule_id: String,
}

/// List rules request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRulesRequest {
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

/// Text to run through the filter.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApplyFilterRequest {
    #[validate(length(max = 100_000))]
    pub text: String,
}

// ==================== Handlers ====================

/// Create a rule.
async fn create(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(input): Json<CreateRuleInput>,
) -> AppResult<ApiResponse<FilterRuleResponse>> {
    let outcome = state.filter_service.create_rule(&actor, input).await?;
    Ok(ApiResponse::from_outcome(outcome))
}

/// Update a rule.
async fn update(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(input): Json<UpdateRuleInput>,
) -> AppResult<ApiResponse<FilterRuleResponse>> {
    let outcome = state.filter_service.update_rule(&actor, input).await?;
    Ok(ApiResponse::from_outcome(outcome))
}

/// Delete a rule.
async fn delete(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(req): Json<RuleIdRequest>,
) -> AppResult<ApiResponse<DeletedRuleResponse>> {
    let outcome = state
        .filter_service
        .delete_rule(&actor, &req.rule_id)
        .await?;
    Ok(ApiResponse::from_outcome(outcome.map(|()| DeletedRuleResponse {
        rule_id: req.rule_id,
    })))
}

/// Show a rule.
async fn show(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(req): Json<RuleIdRequest>,
) -> AppResult<ApiResponse<FilterRuleResponse>> {
    let rule = state.filter_service.get_rule(&actor, &req.rule_id).await?;
    Ok(ApiResponse::ok(rule.into()))
}

/// List rules, active or not.
async fn list(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(req): Json<ListRulesRequest>,
) -> AppResult<ApiResponse<Vec<FilterRuleResponse>>> {
    let rules = state
        .filter_service
        .list_rules(&actor, req.limit.min(MAX_LIMIT), req.offset)
        .await?;
    Ok(ApiResponse::ok(rules.into_iter().map(Into::into).collect()))
}

/// Preview the active rules against some text.
async fn preview(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(req): Json<ApplyFilterRequest>,
) -> AppResult<ApiResponse<FilterOutcome>> {
    req.validate()?;
    let outcome = state.filter_service.preview(&actor, &req.text).await?;
    Ok(ApiResponse::ok(outcome))
}

/// State of the installed rule snapshot.
async fn status(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<SnapshotInfo>> {
    actor.require_admin("inspect content filters")?;
    Ok(ApiResponse::ok(state.filter_cache.snapshot_info()))
}

/// Filter submitted content.
async fn apply(
    AuthActor(_actor): AuthActor,
    State(state): State<AppState>,
    Json(req): Json<ApplyFilterRequest>,
) -> AppResult<ApiResponse<FilterOutcome>> {
    req.validate()?;
    let outcome = state.filter_cache.apply(&req.text).await?;
    Ok(ApiResponse::ok(outcome))
}

// ==================== Router ====================

/// Filtering for the content submission pipeline.
pub fn router() -> Router<AppState> {
    Router::new().route("/apply", post(apply))
}

/// Rule administration.
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/update", post(update))
        .route("/delete", post(delete))
        .route("/show", post(show))
        .route("/list", post(list))
        .route("/preview", post(preview))
        .route("/status", post(status))
}
