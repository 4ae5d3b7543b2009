//! Moderation audit log.
//!
//! One immutable entry per state-changing staff action. There is no update
//! or delete path.

use sea_orm::Set;
use serde_json::{Value, json};
use tracing::{debug, error};
use warden_common::{AppResult, IdGenerator, SharedClock};
use warden_db::{
    entities::moderation_log::{self, ModerationAction},
    repositories::{ModerationLogFilter, ModerationLogRepository},
};

use super::{actor::Actor, outcome::Degradation};

/// An entry about to be appended.
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub moderator_id: String,
    pub action: ModerationAction,
    pub target_user_id: Option<String>,
    pub target_post_id: Option<String>,
    pub target_thread_id: Option<String>,
    pub reason: Option<String>,
    pub details: Value,
}

impl NewLogEntry {
    #[must_use]
    pub fn new(moderator_id: impl Into<String>, action: ModerationAction) -> Self {
        Self {
            moderator_id: moderator_id.into(),
            action,
            target_user_id: None,
            target_post_id: None,
            target_thread_id: None,
            reason: None,
            details: json!({}),
        }
    }

    #[must_use]
    pub fn target_user(mut self, user_id: impl Into<String>) -> Self {
        self.target_user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn target_post(mut self, post_id: Option<String>) -> Self {
        self.target_post_id = post_id;
        self
    }

    #[must_use]
    pub fn target_thread(mut self, thread_id: Option<String>) -> Self {
        self.target_thread_id = thread_id;
        self
    }

    #[must_use]
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[must_use]
    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

/// Append-only moderation log.
#[derive(Clone)]
pub struct AuditLog {
    log_repo: ModerationLogRepository,
    clock: SharedClock,
    id_gen: IdGenerator,
}

impl AuditLog {
    #[must_use]
    pub const fn new(log_repo: ModerationLogRepository, clock: SharedClock) -> Self {
        Self {
            log_repo,
            clock,
            id_gen: IdGenerator::new(),
        }
    }

    /// Insert an entry.
    pub async fn append(&self, entry: NewLogEntry) -> AppResult<moderation_log::Model> {
        let model = moderation_log::ActiveModel {
            id: Set(self.id_gen.generate()),
            moderator_id: Set(entry.moderator_id),
            action: Set(entry.action),
            target_user_id: Set(entry.target_user_id),
            target_post_id: Set(entry.target_post_id),
            target_thread_id: Set(entry.target_thread_id),
            reason: Set(entry.reason),
            details: Set(entry.details),
            created_at: Set(self.clock.now().into()),
        };

        self.log_repo.append(model).await
    }

    /// Append after the primary write has committed. A failure is logged
    /// and reported as a degradation instead of an error.
    pub async fn record(&self, entry: NewLogEntry) -> Option<Degradation> {
        let action = entry.action;
        let moderator_id = entry.moderator_id.clone();

        match self.append(entry).await {
            Ok(logged) => {
                debug!(log_id = %logged.id, action = action.as_str(), "Moderation action logged");
                None
            }
            Err(e) => {
                error!(
                    error = %e,
                    action = action.as_str(),
                    moderator_id = %moderator_id,
                    "Failed to append moderation log entry"
                );
                Some(Degradation::AuditDelayed)
            }
        }
    }

    /// List entries newest first. Staff only.
    pub async fn list(
        &self,
        actor: &Actor,
        filter: ModerationLogFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<moderation_log::Model>> {
        actor.require_staff("view the moderation log")?;
        self.log_repo.list(filter, limit, offset).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase};
    use std::sync::Arc;
    use warden_common::{AppError, Clock, ManualClock};

    fn entry_row(id: &str, action: ModerationAction) -> moderation_log::Model {
        moderation_log::Model {
            id: id.to_string(),
            moderator_id: "mod1".to_string(),
            action,
            target_user_id: Some("user1".to_string()),
            target_post_id: None,
            target_thread_id: None,
            reason: Some("Spam".to_string()),
            details: json!({}),
            created_at: ManualClock::from_recent().now().into(),
        }
    }

    fn audit_with(db: MockDatabase) -> AuditLog {
        AuditLog::new(
            ModerationLogRepository::new(Arc::new(db.into_connection())),
            Arc::new(ManualClock::from_recent()),
        )
    }

    #[tokio::test]
    async fn test_record_success() {
        let audit = audit_with(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[entry_row("log1", ModerationAction::Warn)]]),
        );

        let degraded = audit
            .record(NewLogEntry::new("mod1", ModerationAction::Warn).target_user("user1"))
            .await;

        assert!(degraded.is_none());
    }

    #[tokio::test]
    async fn test_record_failure_is_degradation() {
        let audit = audit_with(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_errors([DbErr::Custom("connection reset".to_string())]),
        );

        let degraded = audit
            .record(NewLogEntry::new("mod1", ModerationAction::Suspend))
            .await;

        assert_eq!(degraded, Some(Degradation::AuditDelayed));
    }

    #[tokio::test]
    async fn test_list_requires_staff() {
        let audit = audit_with(MockDatabase::new(DatabaseBackend::Postgres));

        let result = audit
            .list(&Actor::user("user1"), ModerationLogFilter::default(), 10, 0)
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
