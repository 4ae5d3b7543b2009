//! Abuse report triage.
//!
//! `pending -> reviewing -> {resolved, dismissed}`, plus `pending ->
//! {resolved, dismissed}` directly. Terminal states never change again and
//! a report under review never goes back to pending.

use sea_orm::Set;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use validator::Validate;
use warden_common::{AppError, AppResult, IdGenerator, SharedClock};
use warden_db::{
    entities::{
        moderation_log::ModerationAction,
        report::{self, ReportPriority, ReportStatus, ReportTargetType},
    },
    repositories::{CloseReport, ReportRepository, UserRepository},
};

use super::{
    actor::Actor,
    audit::{AuditLog, NewLogEntry},
    notification::{ModerationNotice, NotificationDispatcher},
    outcome::ActionOutcome,
};

/// Input for filing a report.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReportInput {
    pub target_type: ReportTargetType,
    /// Post or thread id. Required unless reporting a user.
    pub target_id: Option<String>,
    pub reported_user_id: String,
    #[validate(length(min = 1, max = 2000))]
    pub reason: String,
    #[validate(length(min = 1, max = 64))]
    pub category: String,
    #[validate(length(max = 4096))]
    pub description: Option<String>,
}

/// Report triage service.
#[derive(Clone)]
pub struct ReportTriageService {
    report_repo: ReportRepository,
    user_repo: UserRepository,
    audit: AuditLog,
    notifier: NotificationDispatcher,
    clock: SharedClock,
    id_gen: IdGenerator,
}

impl ReportTriageService {
    #[must_use]
    pub const fn new(
        report_repo: ReportRepository,
        user_repo: UserRepository,
        audit: AuditLog,
        notifier: NotificationDispatcher,
        clock: SharedClock,
    ) -> Self {
        Self {
            report_repo,
            user_repo,
            audit,
            notifier,
            clock,
            id_gen: IdGenerator::new(),
        }
    }

    /// File a new report. Open to any authenticated user.
    pub async fn submit(
        &self,
        reporter: &Actor,
        input: SubmitReportInput,
    ) -> AppResult<report::Model> {
        input.validate()?;

        let reason = input.reason.trim();
        if reason.is_empty() {
            return Err(AppError::Validation("Report reason is required".to_string()));
        }
        let category = input.category.trim();
        if category.is_empty() {
            return Err(AppError::Validation("Report category is required".to_string()));
        }
        if reporter.id == input.reported_user_id {
            return Err(AppError::Validation("Cannot report yourself".to_string()));
        }

        let target_id = match input.target_type {
            ReportTargetType::User => None,
            ReportTargetType::Post | ReportTargetType::Thread => {
                let id = input
                    .target_id
                    .filter(|id| !id.trim().is_empty())
                    .ok_or_else(|| {
                        AppError::Validation("targetId is required for post and thread reports".to_string())
                    })?;
                Some(id)
            }
        };

        self.user_repo.get_by_id(&input.reported_user_id).await?;

        let now = self.clock.now();
        let model = report::ActiveModel {
            id: Set(self.id_gen.generate()),
            reporter_id: Set(reporter.id.clone()),
            reported_user_id: Set(input.reported_user_id),
            target_type: Set(input.target_type),
            target_id: Set(target_id),
            reason: Set(reason.to_string()),
            category: Set(category.to_string()),
            description: Set(input
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())),
            status: Set(ReportStatus::Pending),
            priority: Set(ReportPriority::Normal),
            assigned_to: Set(None),
            resolved_by: Set(None),
            resolved_at: Set(None),
            resolution_notes: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(None),
        };

        let report = self.report_repo.create(model).await?;

        info!(
            report_id = %report.id,
            reporter_id = %report.reporter_id,
            reported_user_id = %report.reported_user_id,
            "Report submitted"
        );

        Ok(report)
    }

    /// Take an unassigned pending report. First writer wins.
    pub async fn assign_to_self(
        &self,
        actor: &Actor,
        report_id: &str,
    ) -> AppResult<ActionOutcome<report::Model>> {
        actor.require_staff("triage reports")?;

        let report = self.report_repo.get_by_id(report_id).await?;
        match report.status {
            ReportStatus::Resolved | ReportStatus::Dismissed => {
                return Err(AppError::Conflict(format!(
                    "Report {report_id} is already {}",
                    report.status.as_str()
                )));
            }
            ReportStatus::Reviewing => {
                return if report.assigned_to.as_deref() == Some(actor.id.as_str()) {
                    Ok(ActionOutcome::new(report))
                } else {
                    Err(AppError::Conflict(format!(
                        "Report {report_id} is already assigned"
                    )))
                };
            }
            ReportStatus::Pending => {}
        }

        let now = self.clock.now();
        if self.report_repo.claim(report_id, &actor.id, now).await? == 0 {
            return Err(AppError::Conflict(format!(
                "Report {report_id} was claimed concurrently"
            )));
        }

        let assigned = report::Model {
            status: ReportStatus::Reviewing,
            assigned_to: Some(actor.id.clone()),
            updated_at: Some(now.into()),
            ..report
        };

        info!(report_id = %assigned.id, moderator_id = %actor.id, "Report assigned");

        let outcome = ActionOutcome::new(assigned.clone()).with(
            self.audit
                .record(
                    NewLogEntry::new(&actor.id, ModerationAction::AssignReport)
                        .target_user(&assigned.reported_user_id)
                        .details(json!({ "reportId": assigned.id })),
                )
                .await,
        );

        Ok(outcome)
    }

    /// Hand a report under review to another moderator.
    pub async fn reassign(
        &self,
        actor: &Actor,
        report_id: &str,
        new_assignee: &str,
    ) -> AppResult<ActionOutcome<report::Model>> {
        actor.require_staff("triage reports")?;

        let report = self.report_repo.get_by_id(report_id).await?;
        let current = match (report.status, report.assigned_to.clone()) {
            (ReportStatus::Reviewing, Some(current)) => current,
            (status, _) => {
                return Err(AppError::Conflict(format!(
                    "Report {report_id} is {} and cannot be reassigned",
                    status.as_str()
                )));
            }
        };

        if current == new_assignee {
            return Ok(ActionOutcome::new(report));
        }

        let now = self.clock.now();
        let rows = self
            .report_repo
            .reassign(report_id, &current, new_assignee, now)
            .await?;
        if rows == 0 {
            return Err(AppError::Conflict(format!(
                "Report {report_id} changed concurrently"
            )));
        }

        let reassigned = report::Model {
            assigned_to: Some(new_assignee.to_string()),
            updated_at: Some(now.into()),
            ..report
        };

        info!(
            report_id = %reassigned.id,
            from = %current,
            to = %new_assignee,
            moderator_id = %actor.id,
            "Report reassigned"
        );

        let outcome = ActionOutcome::new(reassigned.clone()).with(
            self.audit
                .record(
                    NewLogEntry::new(&actor.id, ModerationAction::ReassignReport)
                        .target_user(&reassigned.reported_user_id)
                        .details(json!({
                            "reportId": reassigned.id,
                            "from": current,
                            "to": new_assignee,
                        })),
                )
                .await,
        );

        Ok(outcome)
    }

    /// Change the priority of an open report. Not audited.
    pub async fn set_priority(
        &self,
        actor: &Actor,
        report_id: &str,
        priority: ReportPriority,
    ) -> AppResult<ActionOutcome<report::Model>> {
        actor.require_staff("triage reports")?;

        let report = self.report_repo.get_by_id(report_id).await?;
        if report.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "Report {report_id} is already {}",
                report.status.as_str()
            )));
        }

        let now = self.clock.now();
        if self.report_repo.set_priority(report_id, priority, now).await? == 0 {
            return Err(AppError::Conflict(format!(
                "Report {report_id} was closed concurrently"
            )));
        }

        Ok(ActionOutcome::new(report::Model {
            priority,
            updated_at: Some(now.into()),
            ..report
        }))
    }

    /// Close a report as resolved.
    ///
    /// Like [`Self::dismiss`], this only requires the report to be open, so
    /// a pending report can be resolved without being claimed first. The
    /// `Reviewing -> Pending` direction stays impossible.
    pub async fn resolve(
        &self,
        actor: &Actor,
        report_id: &str,
        notes: Option<String>,
    ) -> AppResult<ActionOutcome<report::Model>> {
        self.close(actor, report_id, notes, ReportStatus::Resolved)
            .await
    }

    /// Close a report as dismissed.
    pub async fn dismiss(
        &self,
        actor: &Actor,
        report_id: &str,
        notes: Option<String>,
    ) -> AppResult<ActionOutcome<report::Model>> {
        self.close(actor, report_id, notes, ReportStatus::Dismissed)
            .await
    }

    /// Shared `Pending | Reviewing -> Resolved | Dismissed` transition.
    async fn close(
        &self,
        actor: &Actor,
        report_id: &str,
        notes: Option<String>,
        status: ReportStatus,
    ) -> AppResult<ActionOutcome<report::Model>> {
        actor.require_staff("triage reports")?;

        let notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        if notes.as_ref().is_some_and(|n| n.chars().count() > 4096) {
            return Err(AppError::Validation("Resolution notes too long".to_string()));
        }

        let report = self.report_repo.get_by_id(report_id).await?;
        if report.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "Report {report_id} is already {}",
                report.status.as_str()
            )));
        }

        let now = self.clock.now();
        let rows = self
            .report_repo
            .close(
                report_id,
                report.status,
                CloseReport {
                    status,
                    resolved_by: actor.id.clone(),
                    notes: notes.clone(),
                    at: now,
                },
            )
            .await?;
        if rows == 0 {
            return Err(AppError::Conflict(format!(
                "Report {report_id} changed concurrently"
            )));
        }

        let previous = report.status;
        let closed = report::Model {
            status,
            resolved_by: Some(actor.id.clone()),
            resolved_at: Some(now.into()),
            resolution_notes: notes,
            updated_at: Some(now.into()),
            ..report
        };

        info!(
            report_id = %closed.id,
            moderator_id = %actor.id,
            status = status.as_str(),
            "Report closed"
        );

        let action = if status == ReportStatus::Resolved {
            ModerationAction::ResolveReport
        } else {
            ModerationAction::DismissReport
        };

        let mut entry = NewLogEntry::new(&actor.id, action)
            .target_user(&closed.reported_user_id)
            .details(json!({
                "reportId": closed.id,
                "previousStatus": previous.as_str(),
            }));
        match closed.target_type {
            ReportTargetType::Post => entry = entry.target_post(closed.target_id.clone()),
            ReportTargetType::Thread => entry = entry.target_thread(closed.target_id.clone()),
            ReportTargetType::User => {}
        }
        if let Some(notes) = &closed.resolution_notes {
            entry = entry.reason(notes);
        }

        let outcome = ActionOutcome::new(closed.clone())
            .with(self.audit.record(entry).await)
            .with(
                self.notifier
                    .notify(
                        &closed.reporter_id,
                        ModerationNotice::ReportClosed {
                            report_id: closed.id.clone(),
                            status,
                        },
                    )
                    .await,
            );

        Ok(outcome)
    }

    /// Get a report.
    pub async fn get(&self, actor: &Actor, report_id: &str) -> AppResult<report::Model> {
        actor.require_staff("view reports")?;
        self.report_repo.get_by_id(report_id).await
    }

    /// Reports newest first, optionally for one status.
    pub async fn list(
        &self,
        actor: &Actor,
        status: Option<ReportStatus>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<report::Model>> {
        actor.require_staff("view reports")?;
        self.report_repo.list(status, limit, offset).await
    }

    /// Reports filed against a user, newest first.
    pub async fn list_for_user(
        &self,
        actor: &Actor,
        user_id: &str,
        limit: u64,
    ) -> AppResult<Vec<report::Model>> {
        actor.require_staff("view reports")?;
        self.report_repo.list_for_user(user_id, limit).await
    }

    /// Number of reports in a status.
    pub async fn count_by_status(&self, actor: &Actor, status: ReportStatus) -> AppResult<u64> {
        actor.require_staff("view reports")?;
        self.report_repo.count_by_status(status).await
    }
}
