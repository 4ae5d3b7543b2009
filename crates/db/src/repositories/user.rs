//! User repository.
//!
//! Only the trust-state columns are written here; account rows themselves
//! are provisioned by the identity provider.

use std::sync::Arc;

use crate::entities::{User, user};
use chrono::{DateTime, Utc};
use warden_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

/// Trust state as written to the user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustStateUpdate {
    pub is_suspended: bool,
    pub suspended_until: Option<DateTime<Utc>>,
}

/// User repository for database operations.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<user::Model>> {
        User::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<user::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))
    }

    /// Create a new user.
    pub async fn create(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Write the derived trust state and clear the stale marker.
    ///
    /// Single-row UPDATE with no read, so repeating it is harmless.
    pub async fn write_trust_state(
        &self,
        user_id: &str,
        state: TrustStateUpdate,
        synced_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = User::update_many()
            .set(user::ActiveModel {
                is_suspended: Set(state.is_suspended),
                suspended_until: Set(state.suspended_until.map(Into::into)),
                trust_state_stale: Set(false),
                trust_synced_at: Set(Some(synced_at.into())),
                updated_at: Set(Some(synced_at.into())),
                ..Default::default()
            })
            .filter(user::Column::Id.eq(user_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("User {user_id} not found")));
        }

        Ok(())
    }

    /// Force the user into the blocked state pending a successful recompute.
    pub async fn mark_blocked_pending(&self, user_id: &str, at: DateTime<Utc>) -> AppResult<()> {
        User::update_many()
            .set(user::ActiveModel {
                is_suspended: Set(true),
                suspended_until: Set(None),
                trust_state_stale: Set(true),
                updated_at: Set(Some(at.into())),
                ..Default::default()
            })
            .filter(user::Column::Id.eq(user_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_user(id: &str, username: &str) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: username.to_string(),
            is_admin: false,
            is_moderator: false,
            is_suspended: false,
            suspended_until: None,
            trust_state_stale: false,
            trust_synced_at: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let user = create_test_user("user1", "alice");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user.clone()]])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let result = repo.get_by_id("user1").await.unwrap();

        assert_eq!(result.username, "alice");
    }

    #[tokio::test]
    async fn test_get_by_id_missing() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let result = repo.get_by_id("ghost").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_write_trust_state_missing_user() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let result = repo
            .write_trust_state(
                "ghost",
                TrustStateUpdate {
                    is_suspended: false,
                    suspended_until: None,
                },
                Utc::now(),
            )
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_write_trust_state() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let result = repo
            .write_trust_state(
                "user1",
                TrustStateUpdate {
                    is_suspended: true,
                    suspended_until: Some(Utc::now()),
                },
                Utc::now(),
            )
            .await;

        assert!(result.is_ok());
    }
}
