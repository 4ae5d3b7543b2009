//! Report endpoints.

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use warden_common::AppResult;
use warden_core::SubmitReportInput;
use warden_db::entities::report::{self, ReportPriority, ReportStatus, ReportTargetType};

use crate::{extractors::AuthActor, middleware::AppState, response::ApiResponse};

use super::{MAX_LIMIT, default_limit};

// ==================== Request/Response Types ====================

/// Report response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub id: String,
    pub reporter_id: String,
    pub reported_user_id: String,
    pub target_type: ReportTargetType,
    pub target_id: Option<String>,
    pub reason: String,
    pub category: String,
    pub description: Option<String>,
    pub status: ReportStatus,
    pub priority: ReportPriority,
    pub assigned_to: Option<String>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<String>,
    pub resolution_notes: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<report::Model> for ReportResponse {
    fn from(r: report::Model) -> Self {
        Self {
            id: r.id,
            reporter_id: r.reporter_id,
            reported_user_id: r.reported_user_id,
            target_type: r.target_type,
            target_id: r.target_id,
            reason: r.reason,
            category: r.category,
            description: r.description,
            status: r.status,
            priority: r.priority,
            assigned_to: r.assigned_to,
            resolved_by: r.resolved_by,
            resolved_at: r.resolved_at.map(|dt| dt.to_rfc3339()),
            resolution_notes: r.resolution_notes,
            created_at: r.created_at.to_rfc3339(),
            updated_at: r.updated_at.map(|dt| dt.to_rfc3339()),
        }
    }
}

/// Report count response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCountResponse {
    pub status: ReportStatus,
    pub count: u64,
}

/// Request naming a single report.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportIdRequest {
    pub report_id: String,
}

/// List reports request. `userId` narrows to reports against that user.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListReportsRequest {
    pub status: Option<ReportStatus>,
    pub user_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

/// Count reports request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountReportsRequest {
    #[serde(default)]
    pub status: ReportStatus,
}

/// Reassign request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignRequest {
    pub report_id: String,
    pub assignee_id: String,
}

/// Priority request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityRequest {
    pub report_id: String,
    pub priority: ReportPriority,
}

/// Resolve or dismiss request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseReportRequest {
    pub report_id: String,
    pub notes: Option<String>,
}

// ==================== Handlers ====================

/// File a report.
async fn create(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(input): Json<SubmitReportInput>,
) -> AppResult<ApiResponse<ReportResponse>> {
    let report = state.report_service.submit(&actor, input).await?;
    Ok(ApiResponse::ok(report.into()))
}

/// List reports.
async fn list(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(req): Json<ListReportsRequest>,
) -> AppResult<ApiResponse<Vec<ReportResponse>>> {
    let limit = req.limit.min(MAX_LIMIT);
    let reports = match req.user_id {
        Some(user_id) => {
            state
                .report_service
                .list_for_user(&actor, &user_id, limit)
                .await?
        }
        None => {
            state
                .report_service
                .list(&actor, req.status, limit, req.offset)
                .await?
        }
    };

    Ok(ApiResponse::ok(reports.into_iter().map(Into::into).collect()))
}

/// Count reports in a status.
async fn count(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(req): Json<CountReportsRequest>,
) -> AppResult<ApiResponse<ReportCountResponse>> {
    let count = state
        .report_service
        .count_by_status(&actor, req.status)
        .await?;
    Ok(ApiResponse::ok(ReportCountResponse {
        status: req.status,
        count,
    }))
}

/// Show a report.
async fn show(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(req): Json<ReportIdRequest>,
) -> AppResult<ApiResponse<ReportResponse>> {
    let report = state.report_service.get(&actor, &req.report_id).await?;
    Ok(ApiResponse::ok(report.into()))
}

/// Assign a pending report to the caller.
async fn assign(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(req): Json<ReportIdRequest>,
) -> AppResult<ApiResponse<ReportResponse>> {
    let outcome = state
        .report_service
        .assign_to_self(&actor, &req.report_id)
        .await?;
    Ok(ApiResponse::from_outcome(outcome))
}

/// Hand a report under review to another moderator.
async fn reassign(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(req): Json<ReassignRequest>,
) -> AppResult<ApiResponse<ReportResponse>> {
    let outcome = state
        .report_service
        .reassign(&actor, &req.report_id, &req.assignee_id)
        .await?;
    Ok(ApiResponse::from_outcome(outcome))
}

/// Change the priority of an open report.
async fn priority(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(req): Json<PriorityRequest>,
) -> AppResult<ApiResponse<ReportResponse>> {
    let outcome = state
        .report_service
        .set_priority(&actor, &req.report_id, req.priority)
        .await?;
    Ok(ApiResponse::from_outcome(outcome))
}

/// Resolve a report.
async fn resolve(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(req): Json<CloseReportRequest>,
) -> AppResult<ApiResponse<ReportResponse>> {
    let outcome = state
        .report_service
        .resolve(&actor, &req.report_id, req.notes)
        .await?;
    Ok(ApiResponse::from_outcome(outcome))
}

/// Dismiss a report.
async fn dismiss(
    AuthActor(actor): AuthActor,
    State(state): State<AppState>,
    Json(req): Json<CloseReportRequest>,
) -> AppResult<ApiResponse<ReportResponse>> {
    let outcome = state
        .report_service
        .dismiss(&actor, &req.report_id, req.notes)
        .await?;
    Ok(ApiResponse::from_outcome(outcome))
}

// ==================== Router ====================

/// Report intake, open to every authenticated user.
pub fn router() -> Router<AppState> {
    Router::new().route("/create", post(create))
}

/// Staff triage.
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/list", post(list))
        .route("/count", post(count))
        .route("/show", post(show))
        .route("/assign", post(assign))
        .route("/reassign", post(reassign))
        .route("/priority", post(priority))
        .route("/resolve", post(resolve))
        .route("/dismiss", post(dismiss))
}
