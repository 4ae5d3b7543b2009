//! Abuse report repository.
//!
//! Every state transition is a conditional UPDATE keyed on the state the
//! caller observed. A zero row count means someone else got there first.

use std::sync::Arc;

use crate::entities::{
    Report,
    report::{self, ReportPriority, ReportStatus},
};
use chrono::{DateTime, Utc};
use warden_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

/// Terminal transition to apply to a report.
#[derive(Debug, Clone)]
pub struct CloseReport {
    pub status: ReportStatus,
    pub resolved_by: String,
    pub notes: Option<String>,
    pub at: DateTime<Utc>,
}

/// Report repository for database operations.
#[derive(Clone)]
pub struct ReportRepository {
    db: Arc<DatabaseConnection>,
}

impl ReportRepository {
    /// Create a new report repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Create a new report.
    pub async fn create(&self, model: report::ActiveModel) -> AppResult<report::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a report by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<report::Model>> {
        Report::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a report by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<report::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Report {id} not found")))
    }

    /// List reports, optionally filtered by status, newest first.
    ///
    /// `id` breaks ties on `created_at` so pages are stable.
    pub async fn list(
        &self,
        status: Option<ReportStatus>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<report::Model>> {
        let mut query = Report::find()
            .order_by_desc(report::Column::CreatedAt)
            .order_by_desc(report::Column::Id);

        if let Some(s) = status {
            query = query.filter(report::Column::Status.eq(s));
        }

        query
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Reports filed against a specific user, newest first.
    pub async fn list_for_user(
        &self,
        user_id: &str,
        limit: u64,
    ) -> AppResult<Vec<report::Model>> {
        Report::find()
            .filter(report::Column::ReportedUserId.eq(user_id))
            .order_by_desc(report::Column::CreatedAt)
            .order_by_desc(report::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count reports in a given status.
    pub async fn count_by_status(&self, status: ReportStatus) -> AppResult<u64> {
        Report::find()
            .filter(report::Column::Status.eq(status))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Claim an unassigned pending report for a moderator.
    pub async fn claim(&self, id: &str, moderator_id: &str, at: DateTime<Utc>) -> AppResult<u64> {
        let result = Report::update_many()
            .set(report::ActiveModel {
                status: Set(ReportStatus::Reviewing),
                assigned_to: Set(Some(moderator_id.to_string())),
                updated_at: Set(Some(at.into())),
                ..Default::default()
            })
            .filter(report::Column::Id.eq(id))
            .filter(report::Column::Status.eq(ReportStatus::Pending))
            .filter(report::Column::AssignedTo.is_null())
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Hand a report under review to another moderator, provided it is still
    /// held by `expected_assignee`.
    pub async fn reassign(
        &self,
        id: &str,
        expected_assignee: &str,
        new_assignee: &str,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = Report::update_many()
            .set(report::ActiveModel {
                assigned_to: Set(Some(new_assignee.to_string())),
                updated_at: Set(Some(at.into())),
                ..Default::default()
            })
            .filter(report::Column::Id.eq(id))
            .filter(report::Column::Status.eq(ReportStatus::Reviewing))
            .filter(report::Column::AssignedTo.eq(expected_assignee))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Change priority while the report is still open.
    pub async fn set_priority(
        &self,
        id: &str,
        priority: ReportPriority,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = Report::update_many()
            .set(report::ActiveModel {
                priority: Set(priority),
                updated_at: Set(Some(at.into())),
                ..Default::default()
            })
            .filter(report::Column::Id.eq(id))
            .filter(
                report::Column::Status.is_in([ReportStatus::Pending, ReportStatus::Reviewing]),
            )
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Move a report into a terminal state if it is still in `expected`.
    pub async fn close(
        &self,
        id: &str,
        expected: ReportStatus,
        close: CloseReport,
    ) -> AppResult<u64> {
        let result = Report::update_many()
            .set(report::ActiveModel {
                status: Set(close.status),
                resolved_by: Set(Some(close.resolved_by)),
                resolved_at: Set(Some(close.at.into())),
                resolution_notes: Set(close.notes),
                updated_at: Set(Some(close.at.into())),
                ..Default::default()
            })
            .filter(report::Column::Id.eq(id))
            .filter(report::Column::Status.eq(expected))
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
    use crate::entities::report::ReportTargetType;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_report(id: &str, reporter_id: &str, target_id: &str) -> report::Model {
        report::Model {
            id: id.to_string(),
            reporter_id: reporter_id.to_string(),
            reported_user_id: target_id.to_string(),
            target_type: ReportTargetType::User,
            target_id: None,
            reason: "Harassment".to_string(),
            category: "abuse".to_string(),
            description: None,
            status: ReportStatus::Pending,
            priority: ReportPriority::Normal,
            assigned_to: None,
            resolved_by: None,
            resolved_at: None,
            resolution_notes: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_list_pending() {
        let report1 = create_test_report("report1", "user1", "user2");
        let report2 = create_test_report("report2", "user3", "user4");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[report1, report2]])
                .into_connection(),
        );

        let repo = ReportRepository::new(db);
        let result = repo
            .list(Some(ReportStatus::Pending), 10, 0)
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_get_report() {
        let report = create_test_report("report1", "user1", "user2");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[report.clone()]])
                .into_connection(),
        );

        let repo = ReportRepository::new(db);
        let result = repo.get_by_id("report1").await.unwrap();

        assert_eq!(result.id, "report1");
    }

    #[tokio::test]
    async fn test_claim_returns_rows_affected() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = ReportRepository::new(db);
        let rows = repo.claim("report1", "mod1", Utc::now()).await.unwrap();

        assert_eq!(rows, 0);
    }
}
