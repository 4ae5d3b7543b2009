//! Content filter rule repository.

use std::sync::Arc;

use crate::entities::{ContentFilterRule, content_filter_rule};
use warden_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

/// Content filter rule repository for database operations.
#[derive(Clone)]
pub struct ContentFilterRuleRepository {
    db: Arc<DatabaseConnection>,
}

impl ContentFilterRuleRepository {
    /// Create a new content filter rule repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a rule by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<content_filter_rule::Model>> {
        ContentFilterRule::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a rule by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<content_filter_rule::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Filter rule {id} not found")))
    }

    /// All active rules in application order (oldest first).
    pub async fn find_active(&self) -> AppResult<Vec<content_filter_rule::Model>> {
        ContentFilterRule::find()
            .filter(content_filter_rule::Column::IsActive.eq(true))
            .order_by_asc(content_filter_rule::Column::CreatedAt)
            .order_by_asc(content_filter_rule::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Every rule, active or not, oldest first.
    pub async fn find_all(
        &self,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<content_filter_rule::Model>> {
        ContentFilterRule::find()
            .order_by_asc(content_filter_rule::Column::CreatedAt)
            .order_by_asc(content_filter_rule::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new rule.
    pub async fn create(
        &self,
        model: content_filter_rule::ActiveModel,
    ) -> AppResult<content_filter_rule::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a rule.
    pub async fn update(
        &self,
        model: content_filter_rule::ActiveModel,
    ) -> AppResult<content_filter_rule::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a rule.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let result = ContentFilterRule::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Filter rule {id} not found")));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::content_filter_rule::FilterType;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_rule(id: &str, pattern: &str) -> content_filter_rule::Model {
        content_filter_rule::Model {
            id: id.to_string(),
            filter_type: FilterType::Word,
            pattern: pattern.to_string(),
            replacement: String::new(),
            is_regex: false,
            is_active: true,
            created_by: "admin1".to_string(),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_find_active() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    create_test_rule("r1", "spam"),
                    create_test_rule("r2", "scam"),
                ]])
                .into_connection(),
        );

        let repo = ContentFilterRuleRepository::new(db);
        let rules = repo.find_active().await.unwrap();

        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].pattern, "spam");
    }

    #[tokio::test]
    async fn test_delete_missing_rule() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = ContentFilterRuleRepository::new(db);
        let result = repo.delete("missing").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
