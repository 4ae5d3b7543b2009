//! Moderation log repository.
//!
//! Insert and read only.

use std::sync::Arc;

use crate::entities::{
    ModerationLog,
    moderation_log::{self, ModerationAction},
};
use warden_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

/// Filter for listing log entries.
#[derive(Debug, Clone, Default)]
pub struct ModerationLogFilter {
    pub moderator_id: Option<String>,
    pub target_user_id: Option<String>,
    pub action: Option<ModerationAction>,
}

/// Moderation log repository for database operations.
#[derive(Clone)]
pub struct ModerationLogRepository {
    db: Arc<DatabaseConnection>,
}

impl ModerationLogRepository {
    /// Create a new moderation log repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Append an entry.
    pub async fn append(
        &self,
        model: moderation_log::ActiveModel,
    ) -> AppResult<moderation_log::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List entries newest first.
    pub async fn list(
        &self,
        filter: ModerationLogFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<moderation_log::Model>> {
        let mut query = ModerationLog::find()
            .order_by_desc(moderation_log::Column::CreatedAt)
            .order_by_desc(moderation_log::Column::Id);

        if let Some(moderator_id) = filter.moderator_id {
            query = query.filter(moderation_log::Column::ModeratorId.eq(moderator_id));
        }
        if let Some(target_user_id) = filter.target_user_id {
            query = query.filter(moderation_log::Column::TargetUserId.eq(target_user_id));
        }
        if let Some(action) = filter.action {
            query = query.filter(moderation_log::Column::Action.eq(action));
        }

        query
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
