//! Suspension and warning lifecycle.
//!
//! Each mutation is a short ordered saga: the record write is
//! authoritative, then trust recompute (suspensions only), audit append and
//! notification follow as catch-ups that may degrade but never fail the
//! action.

use chrono::Duration;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use validator::Validate;
use warden_common::{AppError, AppResult, IdGenerator, SharedClock};
use warden_db::{
    entities::{
        moderation_log::ModerationAction,
        suspension::{self, SuspensionKind, SuspensionStatus},
        warning,
    },
    repositories::{SuspensionRepository, UserRepository, WarningRepository},
};

use super::{
    actor::Actor,
    audit::{AuditLog, NewLogEntry},
    notification::{ModerationNotice, NotificationDispatcher},
    outcome::ActionOutcome,
    trust_state::TrustStateStore,
};

/// Longest suspension or warning lifetime accepted, in days.
const MAX_DURATION_DAYS: i64 = 36_500;

/// Input for suspending a user.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SuspendInput {
    pub user_id: String,
    #[validate(length(min = 1, max = 512))]
    pub reason: String,
    #[validate(length(max = 4096))]
    pub description: Option<String>,
    pub kind: SuspensionKind,
    /// Required for temporary suspensions; ignored otherwise.
    pub duration_days: Option<i64>,
}

/// Input for warning a user.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WarnInput {
    pub user_id: String,
    #[validate(length(min = 1, max = 512))]
    pub reason: String,
    #[validate(length(max = 4096))]
    pub description: Option<String>,
    #[validate(range(min = 0, max = 1000))]
    #[serde(default = "default_points")]
    pub points: i32,
    /// Defaults to `moderation.warning_expiry_days`.
    pub expires_in_days: Option<i64>,
}

const fn default_points() -> i32 {
    1
}

/// Editable text of a suspension. Kind and duration are fixed at issue.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EditSuspensionInput {
    pub suspension_id: String,
    #[validate(length(min = 1, max = 512))]
    pub reason: Option<String>,
    #[validate(length(max = 4096))]
    pub description: Option<String>,
}

/// Editable text of a warning. Points and expiry are fixed at issue.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EditWarningInput {
    pub warning_id: String,
    #[validate(length(min = 1, max = 512))]
    pub reason: Option<String>,
    #[validate(length(max = 4096))]
    pub description: Option<String>,
}

/// A suspension together with its status at read time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspensionView {
    #[serde(flatten)]
    pub suspension: suspension::Model,
    pub status: SuspensionStatus,
}

fn non_blank(value: &str, field: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Empty descriptions are stored as NULL.
fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

fn days(value: i64, field: &str) -> AppResult<Duration> {
    if !(1..=MAX_DURATION_DAYS).contains(&value) {
        return Err(AppError::Validation(format!(
            "{field} must be between 1 and {MAX_DURATION_DAYS} days"
        )));
    }
    Ok(Duration::days(value))
}

/// Issues, edits, lifts and removes suspensions and warnings.
#[derive(Clone)]
pub struct LifecycleService {
    suspension_repo: SuspensionRepository,
    warning_repo: WarningRepository,
    user_repo: UserRepository,
    trust: TrustStateStore,
    audit: AuditLog,
    notifier: NotificationDispatcher,
    clock: SharedClock,
    id_gen: IdGenerator,
    warning_expiry_days: i64,
}

impl LifecycleService {
    #[must_use]
    pub fn new(
        suspension_repo: SuspensionRepository,
        warning_repo: WarningRepository,
        user_repo: UserRepository,
        trust: TrustStateStore,
        audit: AuditLog,
        notifier: NotificationDispatcher,
        clock: SharedClock,
    ) -> Self {
        Self {
            suspension_repo,
            warning_repo,
            user_repo,
            trust,
            audit,
            notifier,
            clock,
            id_gen: IdGenerator::new(),
            warning_expiry_days: 30,
        }
    }

    /// Override the default warning lifetime.
    #[must_use]
    pub const fn with_warning_expiry_days(mut self, days: i64) -> Self {
        self.warning_expiry_days = days;
        self
    }

    // ========== Suspensions ==========

    /// Suspend a user.
    pub async fn suspend(
        &self,
        actor: &Actor,
        input: SuspendInput,
    ) -> AppResult<ActionOutcome<suspension::Model>> {
        actor.require_staff("suspend users")?;
        input.validate()?;

        if input.kind == SuspensionKind::SuperBan {
            actor.require_admin("issue super bans")?;
        }
        if actor.id == input.user_id {
            return Err(AppError::Validation("Cannot suspend yourself".to_string()));
        }

        let reason = non_blank(&input.reason, "Suspension reason")?;
        let now = self.clock.now();

        let expires_at = if input.kind.is_timed() {
            let duration_days = input.duration_days.ok_or_else(|| {
                AppError::Validation("Temporary suspensions require durationDays".to_string())
            })?;
            Some(now + days(duration_days, "durationDays")?)
        } else {
            if let Some(ignored) = input.duration_days {
                debug!(
                    kind = ?input.kind,
                    duration_days = ignored,
                    "Ignoring duration for open-ended suspension"
                );
            }
            None
        };

        self.user_repo.get_by_id(&input.user_id).await?;

        let model = suspension::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(input.user_id.clone()),
            issued_by: Set(actor.id.clone()),
            reason: Set(reason.clone()),
            description: Set(normalize_description(input.description)),
            kind: Set(input.kind),
            is_active: Set(true),
            starts_at: Set(now.into()),
            expires_at: Set(expires_at.map(Into::into)),
            lifted_at: Set(None),
            lifted_by: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(None),
        };

        let suspension = self.suspension_repo.create(model).await?;

        info!(
            suspension_id = %suspension.id,
            user_id = %suspension.user_id,
            moderator_id = %actor.id,
            kind = ?suspension.kind,
            "User suspended"
        );

        let action = if suspension.kind.is_timed() {
            ModerationAction::Suspend
        } else {
            ModerationAction::Ban
        };

        let outcome = ActionOutcome::new(suspension.clone())
            .with(self.trust.sync_after_suspend(&suspension.user_id).await)
            .with(
                self.audit
                    .record(
                        NewLogEntry::new(&actor.id, action)
                            .target_user(&suspension.user_id)
                            .reason(&reason)
                            .details(json!({
                                "suspensionId": suspension.id,
                                "kind": suspension.kind,
                                "expiresAt": suspension.expires_at,
                            })),
                    )
                    .await,
            )
            .with(
                self.notifier
                    .notify(
                        &suspension.user_id,
                        ModerationNotice::Suspended {
                            suspension_id: suspension.id.clone(),
                            kind: suspension.kind,
                            reason,
                            expires_at,
                        },
                    )
                    .await,
            );

        Ok(outcome)
    }

    /// Lift an active suspension.
    ///
    /// An unknown id is `NotFound`; a suspension that is already lifted is
    /// `Conflict`, the same error a lost concurrent lift gets.
    pub async fn lift_suspension(
        &self,
        actor: &Actor,
        suspension_id: &str,
    ) -> AppResult<ActionOutcome<suspension::Model>> {
        actor.require_staff("lift suspensions")?;

        let suspension = self.suspension_repo.get_by_id(suspension_id).await?;
        if !suspension.is_active {
            return Err(AppError::Conflict(format!(
                "Suspension {suspension_id} is already lifted"
            )));
        }

        let now = self.clock.now();
        let rows = self
            .suspension_repo
            .lift_if_active(suspension_id, &actor.id, now)
            .await?;
        if rows == 0 {
            return Err(AppError::Conflict(format!(
                "Suspension {suspension_id} was lifted concurrently"
            )));
        }

        let lifted = suspension::Model {
            is_active: false,
            lifted_at: Some(now.into()),
            lifted_by: Some(actor.id.clone()),
            updated_at: Some(now.into()),
            ..suspension
        };

        info!(
            suspension_id = %lifted.id,
            user_id = %lifted.user_id,
            moderator_id = %actor.id,
            "Suspension lifted"
        );

        let outcome = ActionOutcome::new(lifted.clone())
            .with(self.trust.sync_after_release(&lifted.user_id).await)
            .with(
                self.audit
                    .record(
                        NewLogEntry::new(&actor.id, ModerationAction::Unsuspend)
                            .target_user(&lifted.user_id)
                            .details(json!({ "suspensionId": lifted.id })),
                    )
                    .await,
            )
            .with(
                self.notifier
                    .notify(
                        &lifted.user_id,
                        ModerationNotice::SuspensionLifted {
                            suspension_id: lifted.id.clone(),
                        },
                    )
                    .await,
            );

        Ok(outcome)
    }

    /// Hard-delete a suspension. Admin only.
    pub async fn delete_suspension(
        &self,
        actor: &Actor,
        suspension_id: &str,
    ) -> AppResult<ActionOutcome<suspension::Model>> {
        actor.require_admin("delete suspensions")?;

        let suspension = self.suspension_repo.get_by_id(suspension_id).await?;
        if self.suspension_repo.delete(suspension_id).await? == 0 {
            return Err(AppError::NotFound(format!(
                "Suspension {suspension_id} not found"
            )));
        }

        info!(
            suspension_id = %suspension.id,
            user_id = %suspension.user_id,
            admin_id = %actor.id,
            "Suspension deleted"
        );

        let outcome = ActionOutcome::new(suspension.clone())
            .with(self.trust.sync_after_release(&suspension.user_id).await)
            .with(
                self.audit
                    .record(
                        NewLogEntry::new(&actor.id, ModerationAction::DeleteSuspension)
                            .target_user(&suspension.user_id)
                            .details(json!({
                                "suspensionId": suspension.id,
                                "kind": suspension.kind,
                                "wasActive": suspension.is_active,
                            })),
                    )
                    .await,
            );

        Ok(outcome)
    }

    /// Amend the reason or description of a suspension.
    pub async fn edit_suspension(
        &self,
        actor: &Actor,
        input: EditSuspensionInput,
    ) -> AppResult<ActionOutcome<suspension::Model>> {
        actor.require_staff("edit suspensions")?;
        input.validate()?;

        let suspension = self.suspension_repo.get_by_id(&input.suspension_id).await?;
        let user_id = suspension.user_id.clone();
        let mut model: suspension::ActiveModel = suspension.into();

        if let Some(reason) = &input.reason {
            model.reason = Set(non_blank(reason, "Suspension reason")?);
        }
        if input.description.is_some() {
            model.description = Set(normalize_description(input.description));
        }
        model.updated_at = Set(Some(self.clock.now().into()));

        let updated = self.suspension_repo.update(model).await?;

        let outcome = ActionOutcome::new(updated.clone()).with(
            self.audit
                .record(
                    NewLogEntry::new(&actor.id, ModerationAction::EditSuspension)
                        .target_user(user_id)
                        .reason(&updated.reason)
                        .details(json!({ "suspensionId": updated.id })),
                )
                .await,
        );

        Ok(outcome)
    }

    /// Get a suspension with its current status.
    pub async fn get_suspension(
        &self,
        actor: &Actor,
        suspension_id: &str,
    ) -> AppResult<SuspensionView> {
        actor.require_staff("view suspensions")?;
        let suspension = self.suspension_repo.get_by_id(suspension_id).await?;
        Ok(self.view(suspension))
    }

    /// Full suspension history for a user, newest first.
    pub async fn list_suspensions_for_user(
        &self,
        actor: &Actor,
        user_id: &str,
    ) -> AppResult<Vec<SuspensionView>> {
        actor.require_staff("view suspensions")?;
        let suspensions = self.suspension_repo.find_by_user(user_id).await?;
        Ok(suspensions.into_iter().map(|s| self.view(s)).collect())
    }

    /// Suspensions still enforced right now, across all users.
    pub async fn list_active_suspensions(
        &self,
        actor: &Actor,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<SuspensionView>> {
        actor.require_staff("view suspensions")?;
        let suspensions = self
            .suspension_repo
            .find_effective(self.clock.now(), limit, offset)
            .await?;
        Ok(suspensions.into_iter().map(|s| self.view(s)).collect())
    }

    fn view(&self, suspension: suspension::Model) -> SuspensionView {
        let status = suspension.status_at(self.clock.now());
        SuspensionView { suspension, status }
    }

    // ========== Warnings ==========

    /// Issue a warning. Warnings never touch the trust state.
    pub async fn warn(
        &self,
        actor: &Actor,
        input: WarnInput,
    ) -> AppResult<ActionOutcome<warning::Model>> {
        actor.require_staff("warn users")?;
        input.validate()?;

        if actor.id == input.user_id {
            return Err(AppError::Validation("Cannot warn yourself".to_string()));
        }

        let reason = non_blank(&input.reason, "Warning reason")?;
        let now = self.clock.now();
        let expires_at = now
            + days(
                input.expires_in_days.unwrap_or(self.warning_expiry_days),
                "expiresInDays",
            )?;

        self.user_repo.get_by_id(&input.user_id).await?;

        let model = warning::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(input.user_id.clone()),
            issued_by: Set(actor.id.clone()),
            reason: Set(reason.clone()),
            description: Set(normalize_description(input.description)),
            points: Set(input.points),
            is_active: Set(true),
            expires_at: Set(expires_at.into()),
            created_at: Set(now.into()),
            updated_at: Set(None),
        };

        let warning = self.warning_repo.create(model).await?;

        info!(
            warning_id = %warning.id,
            user_id = %warning.user_id,
            moderator_id = %actor.id,
            points = warning.points,
            "User warned"
        );

        let outcome = ActionOutcome::new(warning.clone())
            .with(
                self.audit
                    .record(
                        NewLogEntry::new(&actor.id, ModerationAction::Warn)
                            .target_user(&warning.user_id)
                            .reason(&reason)
                            .details(json!({
                                "warningId": warning.id,
                                "points": warning.points,
                                "expiresAt": warning.expires_at,
                            })),
                    )
                    .await,
            )
            .with(
                self.notifier
                    .notify(
                        &warning.user_id,
                        ModerationNotice::Warned {
                            warning_id: warning.id.clone(),
                            reason,
                            points: warning.points,
                            expires_at,
                        },
                    )
                    .await,
            );

        Ok(outcome)
    }

    /// Amend the reason or description of a warning.
    pub async fn edit_warning(
        &self,
        actor: &Actor,
        input: EditWarningInput,
    ) -> AppResult<ActionOutcome<warning::Model>> {
        actor.require_staff("edit warnings")?;
        input.validate()?;

        let warning = self.warning_repo.get_by_id(&input.warning_id).await?;
        let user_id = warning.user_id.clone();
        let mut model: warning::ActiveModel = warning.into();

        if let Some(reason) = &input.reason {
            model.reason = Set(non_blank(reason, "Warning reason")?);
        }
        if input.description.is_some() {
            model.description = Set(normalize_description(input.description));
        }
        model.updated_at = Set(Some(self.clock.now().into()));

        let updated = self.warning_repo.update(model).await?;

        let outcome = ActionOutcome::new(updated.clone()).with(
            self.audit
                .record(
                    NewLogEntry::new(&actor.id, ModerationAction::EditWarning)
                        .target_user(user_id)
                        .reason(&updated.reason)
                        .details(json!({ "warningId": updated.id })),
                )
                .await,
        );

        Ok(outcome)
    }

    /// Remove a warning. Admin only.
    pub async fn delete_warning(
        &self,
        actor: &Actor,
        warning_id: &str,
    ) -> AppResult<ActionOutcome<warning::Model>> {
        actor.require_admin("delete warnings")?;

        let warning = self.warning_repo.get_by_id(warning_id).await?;
        if self.warning_repo.delete(warning_id).await? == 0 {
            return Err(AppError::NotFound(format!("Warning {warning_id} not found")));
        }

        info!(warning_id = %warning.id, admin_id = %actor.id, "Warning deleted");

        let outcome = ActionOutcome::new(warning.clone()).with(
            self.audit
                .record(
                    NewLogEntry::new(&actor.id, ModerationAction::DeleteWarning)
                        .target_user(&warning.user_id)
                        .details(json!({
                            "warningId": warning.id,
                            "points": warning.points,
                        })),
                )
                .await,
        );

        Ok(outcome)
    }

    /// Warnings that have not expired, newest first.
    pub async fn list_active_warnings_for_user(
        &self,
        actor: &Actor,
        user_id: &str,
    ) -> AppResult<Vec<warning::Model>> {
        actor.require_staff("view warnings")?;
        self.active_warnings(user_id).await
    }

    /// Total points of a user's active warnings. Informational only.
    pub async fn warning_points(&self, actor: &Actor, user_id: &str) -> AppResult<i64> {
        actor.require_staff("view warnings")?;
        let warnings = self.active_warnings(user_id).await?;
        Ok(warnings.iter().map(|w| i64::from(w.points)).sum())
    }

    async fn active_warnings(&self, user_id: &str) -> AppResult<Vec<warning::Model>> {
        let now = self.clock.now();
        let warnings = self.warning_repo.find_active_by_user(user_id, now).await?;
        Ok(warnings.into_iter().filter(|w| w.is_active_at(now)).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::{
        notification::tests::RecordingTransport,
        outcome::Degradation,
        trust_state::{EffectiveTrustState, compute_trust_state},
    };
    use chrono::{DateTime, Utc};
    use sea_orm::{DatabaseBackend, DatabaseConnection, DbErr, MockDatabase, MockExecResult};
    use std::sync::Arc;
    use warden_common::{Clock, ManualClock};
    use warden_db::{
        entities::{moderation_log, user},
        repositories::ModerationLogRepository,
        test_utils::{into_transaction_log, recorded_log_entries},
    };

    fn user_row(id: &str, now: DateTime<Utc>) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: format!("user_{id}"),
            is_admin: false,
            is_moderator: false,
            is_suspended: false,
            suspended_until: None,
            trust_state_stale: false,
            trust_synced_at: None,
            created_at: now.into(),
            updated_at: None,
        }
    }

    fn suspension_row(
        id: &str,
        kind: SuspensionKind,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> suspension::Model {
        suspension::Model {
            id: id.to_string(),
            user_id: "user1".to_string(),
            issued_by: "mod1".to_string(),
            reason: "Spam".to_string(),
            description: None,
            kind,
            is_active: true,
            starts_at: now.into(),
            expires_at: expires_at.map(Into::into),
            lifted_at: None,
            lifted_by: None,
            created_at: now.into(),
            updated_at: None,
        }
    }

    fn warning_row(id: &str, points: i32, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> warning::Model {
        warning::Model {
            id: id.to_string(),
            user_id: "user1".to_string(),
            issued_by: "mod1".to_string(),
            reason: "Flooding".to_string(),
            description: None,
            points,
            is_active: true,
            expires_at: expires_at.into(),
            created_at: now.into(),
            updated_at: None,
        }
    }

    fn log_row(action: ModerationAction, now: DateTime<Utc>) -> moderation_log::Model {
        moderation_log::Model {
            id: "log1".to_string(),
            moderator_id: "mod1".to_string(),
            action,
            target_user_id: Some("user1".to_string()),
            target_post_id: None,
            target_thread_id: None,
            reason: None,
            details: json!({}),
            created_at: now.into(),
        }
    }

    fn exec_ok(rows: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: rows,
        }
    }

    fn service(db: MockDatabase, clock: ManualClock) -> (LifecycleService, Arc<RecordingTransport>) {
        service_on(&Arc::new(db.into_connection()), clock)
    }

    fn service_on(
        conn: &Arc<DatabaseConnection>,
        clock: ManualClock,
    ) -> (LifecycleService, Arc<RecordingTransport>) {
        let conn = Arc::clone(conn);
        let clock: SharedClock = Arc::new(clock);
        let transport = Arc::new(RecordingTransport::default());

        let trust = TrustStateStore::new(
            UserRepository::new(Arc::clone(&conn)),
            SuspensionRepository::new(Arc::clone(&conn)),
            Arc::clone(&clock),
            2,
        );
        let audit = AuditLog::new(ModerationLogRepository::new(Arc::clone(&conn)), Arc::clone(&clock));

        let svc = LifecycleService::new(
            SuspensionRepository::new(Arc::clone(&conn)),
            WarningRepository::new(Arc::clone(&conn)),
            UserRepository::new(conn),
            trust,
            audit,
            NotificationDispatcher::new(transport.clone()),
            clock,
        );

        (svc, transport)
    }

    fn trust_store(conn: &Arc<DatabaseConnection>, clock: &ManualClock) -> TrustStateStore {
        TrustStateStore::new(
            UserRepository::new(Arc::clone(conn)),
            SuspensionRepository::new(Arc::clone(conn)),
            Arc::new(clock.clone()),
            2,
        )
    }

    fn logged(conn: Arc<DatabaseConnection>) -> Vec<(String, String)> {
        recorded_log_entries(&into_transaction_log(conn))
    }

    fn entry(moderator: &str, action: &str) -> (String, String) {
        (moderator.to_string(), action.to_string())
    }

    fn suspend_input(kind: SuspensionKind, duration_days: Option<i64>) -> SuspendInput {
        SuspendInput {
            user_id: "user1".to_string(),
            reason: "Spam".to_string(),
            description: None,
            kind,
            duration_days,
        }
    }

    #[tokio::test]
    async fn test_temporary_suspension_blocks_until_expiry() {
        let clock = ManualClock::from_recent();
        let now = clock.now();
        let expires = now + Duration::days(7);
        let created = suspension_row("s1", SuspensionKind::Temporary, Some(expires), now);
        let synced = user::Model {
            is_suspended: true,
            suspended_until: Some(expires.into()),
            ..user_row("user1", now)
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // suspend
            .append_query_results([[user_row("user1", now)]])
            .append_query_results([[created.clone()], [created.clone()]])
            .append_exec_results([exec_ok(1)])
            .append_query_results([[log_row(ModerationAction::Suspend, now)]])
            // recompute, then two reads of the synced row
            .append_query_results([[created]])
            .append_exec_results([exec_ok(1)])
            .append_query_results([[synced.clone()], [synced]]);
        let conn = Arc::new(db.into_connection());

        let (svc, transport) = service_on(&conn, clock.clone());
        let outcome = svc
            .suspend(
                &Actor::moderator("mod1"),
                suspend_input(SuspensionKind::Temporary, Some(7)),
            )
            .await
            .unwrap();

        assert!(!outcome.is_degraded());
        assert_eq!(outcome.value.expires_at, Some(expires.into()));
        assert_eq!(transport.delivered.lock().unwrap().len(), 1);

        let store = trust_store(&conn, &clock);
        assert_eq!(
            store.recompute("user1").await.unwrap(),
            EffectiveTrustState {
                is_suspended: true,
                suspended_until: Some(expires),
            }
        );

        assert!(store.is_blocked("user1").await.unwrap());
        clock.advance(Duration::days(7) + Duration::seconds(1));
        assert!(!store.is_blocked("user1").await.unwrap());

        drop(svc);
        drop(store);
        assert_eq!(logged(conn), vec![entry("mod1", "suspend")]);
    }

    #[tokio::test]
    async fn test_permanent_suspension_ignores_duration() {
        let clock = ManualClock::from_recent();
        let now = clock.now();
        let created = suspension_row("s1", SuspensionKind::Permanent, None, now);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user_row("user1", now)]])
            .append_query_results([[created.clone()], [created]])
            .append_exec_results([exec_ok(1)])
            .append_query_results([[log_row(ModerationAction::Ban, now)]]);
        let conn = Arc::new(db.into_connection());

        let (svc, _) = service_on(&conn, clock);
        let outcome = svc
            .suspend(
                &Actor::moderator("mod1"),
                suspend_input(SuspensionKind::Permanent, Some(3)),
            )
            .await
            .unwrap();

        assert!(outcome.value.expires_at.is_none());
        assert_eq!(outcome.value.kind, SuspensionKind::Permanent);

        drop(svc);
        assert_eq!(logged(conn), vec![entry("mod1", "ban")]);
    }

    #[tokio::test]
    async fn test_temporary_requires_positive_duration() {
        let clock = ManualClock::from_recent();
        let (svc, _) = service(MockDatabase::new(DatabaseBackend::Postgres), clock);
        let moderator = Actor::moderator("mod1");

        for duration in [None, Some(0), Some(-5)] {
            let result = svc
                .suspend(&moderator, suspend_input(SuspensionKind::Temporary, duration))
                .await;
            assert!(matches!(result, Err(AppError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn test_blank_reason_rejected() {
        let clock = ManualClock::from_recent();
        let (svc, _) = service(MockDatabase::new(DatabaseBackend::Postgres), clock);

        let mut input = suspend_input(SuspensionKind::Permanent, None);
        input.reason = "   ".to_string();

        let result = svc.suspend(&Actor::moderator("mod1"), input).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_super_ban_is_admin_only() {
        let clock = ManualClock::from_recent();
        let (svc, _) = service(MockDatabase::new(DatabaseBackend::Postgres), clock);

        let result = svc
            .suspend(
                &Actor::moderator("mod1"),
                suspend_input(SuspensionKind::SuperBan, None),
            )
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_regular_user_cannot_suspend() {
        let clock = ManualClock::from_recent();
        let (svc, _) = service(MockDatabase::new(DatabaseBackend::Postgres), clock);

        let result = svc
            .suspend(&Actor::user("user2"), suspend_input(SuspensionKind::Permanent, None))
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_cannot_suspend_self() {
        let clock = ManualClock::from_recent();
        let (svc, _) = service(MockDatabase::new(DatabaseBackend::Postgres), clock);

        let result = svc
            .suspend(&Actor::moderator("user1"), suspend_input(SuspensionKind::Permanent, None))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_suspend_degrades_when_recompute_fails() {
        let clock = ManualClock::from_recent();
        let now = clock.now();
        let created = suspension_row("s1", SuspensionKind::Permanent, None, now);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user_row("user1", now)]])
            .append_query_results([[created.clone()], [created.clone()], [created]])
            .append_exec_errors([
                DbErr::Custom("connection reset".to_string()),
                DbErr::Custom("connection reset".to_string()),
            ])
            .append_exec_results([exec_ok(1)])
            .append_query_results([[log_row(ModerationAction::Ban, now)]]);

        let (svc, _) = service(db, clock);
        let outcome = svc
            .suspend(
                &Actor::moderator("mod1"),
                suspend_input(SuspensionKind::Permanent, None),
            )
            .await
            .unwrap();

        assert_eq!(outcome.degraded, vec![Degradation::TrustStateStale]);
    }

    #[tokio::test]
    async fn test_suspend_unknown_user() {
        let clock = ManualClock::from_recent();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()]);

        let (svc, _) = service(db, clock);
        let result = svc
            .suspend(&Actor::moderator("mod1"), suspend_input(SuspensionKind::Permanent, None))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_lift_one_of_two_keeps_user_blocked() {
        let clock = ManualClock::from_recent();
        let now = clock.now();
        let first = suspension_row("s1", SuspensionKind::Temporary, Some(now + Duration::days(3)), now);
        let second = suspension_row("s2", SuspensionKind::Permanent, None, now);
        let lifted_first = suspension::Model {
            is_active: false,
            lifted_by: Some("mod1".to_string()),
            ..first.clone()
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[first]])
            .append_exec_results([exec_ok(1)])
            .append_query_results([[lifted_first.clone(), second.clone()]])
            .append_exec_results([exec_ok(1)])
            .append_query_results([[log_row(ModerationAction::Unsuspend, now)]]);
        let conn = Arc::new(db.into_connection());

        let (svc, transport) = service_on(&conn, clock);
        let outcome = svc
            .lift_suspension(&Actor::moderator("mod1"), "s1")
            .await
            .unwrap();

        assert!(!outcome.value.is_active);
        assert_eq!(outcome.value.lifted_by.as_deref(), Some("mod1"));
        assert_eq!(outcome.value.status_at(now), SuspensionStatus::Lifted);
        assert!(!outcome.is_degraded());
        assert_eq!(transport.delivered.lock().unwrap().len(), 1);

        assert!(compute_trust_state(&[lifted_first.clone(), second], now).is_suspended);
        assert!(!compute_trust_state(&[lifted_first], now).is_suspended);

        drop(svc);
        assert_eq!(logged(conn), vec![entry("mod1", "unsuspend")]);
    }

    #[tokio::test]
    async fn test_lift_already_lifted_is_conflict() {
        let clock = ManualClock::from_recent();
        let now = clock.now();
        let mut lifted = suspension_row("s1", SuspensionKind::Permanent, None, now);
        lifted.is_active = false;

        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[lifted]]);

        let (svc, _) = service(db, clock);
        let result = svc.lift_suspension(&Actor::moderator("mod1"), "s1").await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_lift_lost_race_is_conflict() {
        let clock = ManualClock::from_recent();
        let now = clock.now();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[suspension_row("s1", SuspensionKind::Permanent, None, now)]])
            .append_exec_results([exec_ok(0)]);

        let (svc, _) = service(db, clock);
        let result = svc.lift_suspension(&Actor::moderator("mod2"), "s1").await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_lift_missing_is_not_found() {
        let clock = ManualClock::from_recent();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<suspension::Model>::new()]);

        let (svc, _) = service(db, clock);
        let result = svc.lift_suspension(&Actor::moderator("mod1"), "nope").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_suspension_requires_admin() {
        let clock = ManualClock::from_recent();
        let (svc, _) = service(MockDatabase::new(DatabaseBackend::Postgres), clock);

        let result = svc.delete_suspension(&Actor::moderator("mod1"), "s1").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_delete_suspension_recomputes() {
        let clock = ManualClock::from_recent();
        let now = clock.now();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[suspension_row("s1", SuspensionKind::Permanent, None, now)]])
            .append_exec_results([exec_ok(1)])
            .append_query_results([Vec::<suspension::Model>::new()])
            .append_exec_results([exec_ok(1)])
            .append_query_results([[log_row(ModerationAction::DeleteSuspension, now)]]);

        let (svc, _) = service(db, clock);
        let outcome = svc
            .delete_suspension(&Actor::admin("admin1"), "s1")
            .await
            .unwrap();

        assert_eq!(outcome.value.id, "s1");
        assert!(!outcome.is_degraded());
    }

    #[tokio::test]
    async fn test_edit_suspension_changes_text_only() {
        let clock = ManualClock::from_recent();
        let now = clock.now();
        let original = suspension_row("s1", SuspensionKind::Temporary, Some(now + Duration::days(7)), now);
        let edited = suspension::Model {
            reason: "Repeated spam".to_string(),
            ..original.clone()
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[original], [edited]])
            .append_query_results([[log_row(ModerationAction::EditSuspension, now)]]);

        let (svc, _) = service(db, clock);
        let outcome = svc
            .edit_suspension(
                &Actor::moderator("mod1"),
                EditSuspensionInput {
                    suspension_id: "s1".to_string(),
                    reason: Some("Repeated spam".to_string()),
                    description: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.value.reason, "Repeated spam");
        assert_eq!(outcome.value.kind, SuspensionKind::Temporary);
    }

    #[tokio::test]
    async fn test_warn_uses_default_expiry() {
        let clock = ManualClock::from_recent();
        let now = clock.now();
        let expires = now + Duration::days(30);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user_row("user1", now)]])
            .append_query_results([[warning_row("w1", 2, expires, now)]])
            .append_query_results([[log_row(ModerationAction::Warn, now)]]);
        let conn = Arc::new(db.into_connection());

        let (svc, transport) = service_on(&conn, clock);
        let outcome = svc
            .warn(
                &Actor::moderator("mod1"),
                WarnInput {
                    user_id: "user1".to_string(),
                    reason: "Flooding".to_string(),
                    description: None,
                    points: 2,
                    expires_in_days: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.value.points, 2);
        assert!(!outcome.is_degraded());

        {
            let delivered = transport.delivered.lock().unwrap();
            assert!(matches!(
                &delivered[0].1,
                ModerationNotice::Warned { expires_at, .. } if *expires_at == expires
            ));
        }

        drop(svc);
        assert_eq!(logged(conn), vec![entry("mod1", "warn")]);
    }

    #[tokio::test]
    async fn test_warn_rejects_negative_points() {
        let clock = ManualClock::from_recent();
        let (svc, _) = service(MockDatabase::new(DatabaseBackend::Postgres), clock);

        let result = svc
            .warn(
                &Actor::moderator("mod1"),
                WarnInput {
                    user_id: "user1".to_string(),
                    reason: "Flooding".to_string(),
                    description: None,
                    points: -1,
                    expires_in_days: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_warn_audit_failure_degrades() {
        let clock = ManualClock::from_recent();
        let now = clock.now();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user_row("user1", now)]])
            .append_query_results([[warning_row("w1", 1, now + Duration::days(30), now)]])
            .append_query_errors([DbErr::Custom("disk full".to_string())]);

        let (svc, _) = service(db, clock);
        let outcome = svc
            .warn(
                &Actor::moderator("mod1"),
                WarnInput {
                    user_id: "user1".to_string(),
                    reason: "Flooding".to_string(),
                    description: None,
                    points: 1,
                    expires_in_days: Some(10),
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.degraded, vec![Degradation::AuditDelayed]);
    }

    #[tokio::test]
    async fn test_warning_points_honours_expiry() {
        let clock = ManualClock::from_recent();
        let now = clock.now();
        let live = warning_row("w1", 3, now + Duration::days(5), now);
        let lapsed = warning_row("w2", 4, now - Duration::seconds(1), now);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[live, lapsed]]);

        let (svc, _) = service(db, clock);
        let points = svc
            .warning_points(&Actor::moderator("mod1"), "user1")
            .await
            .unwrap();

        assert_eq!(points, 3);
    }

    #[tokio::test]
    async fn test_delete_warning_requires_admin() {
        let clock = ManualClock::from_recent();
        let (svc, _) = service(MockDatabase::new(DatabaseBackend::Postgres), clock);

        let result = svc.delete_warning(&Actor::moderator("mod1"), "w1").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
