//! Warning repository.

use std::sync::Arc;

use crate::entities::{Warning, warning};
use chrono::{DateTime, Utc};
use warden_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};

/// Warning repository for database operations.
#[derive(Clone)]
pub struct WarningRepository {
    db: Arc<DatabaseConnection>,
}

impl WarningRepository {
    /// Create a new warning repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert a new warning.
    pub async fn create(&self, model: warning::ActiveModel) -> AppResult<warning::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a warning by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<warning::Model>> {
        Warning::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a warning by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<warning::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Warning {id} not found")))
    }

    /// Warnings that have not expired at `now`, newest first.
    pub async fn find_active_by_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<warning::Model>> {
        Warning::find()
            .filter(warning::Column::UserId.eq(user_id))
            .filter(warning::Column::IsActive.eq(true))
            .filter(warning::Column::ExpiresAt.gte(now))
            .order_by_desc(warning::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Full warning history for a user, newest first.
    pub async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<warning::Model>> {
        Warning::find()
            .filter(warning::Column::UserId.eq(user_id))
            .order_by_desc(warning::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a warning.
    pub async fn update(&self, model: warning::ActiveModel) -> AppResult<warning::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Hard-delete a warning. Returns the number of rows removed.
    pub async fn delete(&self, id: &str) -> AppResult<u64> {
        let result = Warning::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_find_active_by_user() {
        let now = Utc::now();
        let warning = warning::Model {
            id: "w1".to_string(),
            user_id: "user1".to_string(),
            issued_by: "mod1".to_string(),
            reason: "Off-topic flooding".to_string(),
            description: None,
            points: 2,
            is_active: true,
            expires_at: (now + Duration::days(30)).into(),
            created_at: now.into(),
            updated_at: None,
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[warning]])
                .into_connection(),
        );

        let repo = WarningRepository::new(db);
        let result = repo.find_active_by_user("user1", now).await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].points, 2);
    }
}
