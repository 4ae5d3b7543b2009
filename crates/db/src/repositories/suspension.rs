//! Suspension repository.

use std::sync::Arc;

use crate::entities::{Suspension, suspension};
use chrono::{DateTime, Utc};
use warden_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

/// Suspension repository for database operations.
#[derive(Clone)]
pub struct SuspensionRepository {
    db: Arc<DatabaseConnection>,
}

impl SuspensionRepository {
    /// Create a new suspension repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert a new suspension.
    pub async fn create(
        &self,
        model: suspension::ActiveModel,
    ) -> AppResult<suspension::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a suspension by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<suspension::Model>> {
        Suspension::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a suspension by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<suspension::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Suspension {id} not found")))
    }

    /// Every suspension ever issued to a user, newest first.
    pub async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<suspension::Model>> {
        Suspension::find()
            .filter(suspension::Column::UserId.eq(user_id))
            .order_by_desc(suspension::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Suspensions that are still enforced at `now`, across all users.
    pub async fn find_effective(
        &self,
        now: DateTime<Utc>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<suspension::Model>> {
        Suspension::find()
            .filter(effective_at(now))
            .order_by_desc(suspension::Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Lift a suspension only if it is still active.
    ///
    /// Returns the number of rows changed; zero means another moderator
    /// lifted it first.
    pub async fn lift_if_active(
        &self,
        id: &str,
        lifted_by: &str,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = Suspension::update_many()
            .set(suspension::ActiveModel {
                is_active: Set(false),
                lifted_at: Set(Some(at.into())),
                lifted_by: Set(Some(lifted_by.to_string())),
                updated_at: Set(Some(at.into())),
                ..Default::default()
            })
            .filter(suspension::Column::Id.eq(id))
            .filter(suspension::Column::IsActive.eq(true))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Update a suspension.
    pub async fn update(
        &self,
        model: suspension::ActiveModel,
    ) -> AppResult<suspension::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Hard-delete a suspension. Returns the number of rows removed.
    pub async fn delete(&self, id: &str) -> AppResult<u64> {
        let result = Suspension::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }
}

/// Active, and either open-ended or not yet expired.
fn effective_at(now: DateTime<Utc>) -> Condition {
    Condition::all()
        .add(suspension::Column::IsActive.eq(true))
        .add(
            Condition::any()
                .add(suspension::Column::ExpiresAt.is_null())
                .add(suspension::Column::ExpiresAt.gt(now)),
        )
}
