//! Synchronized "is this user blocked" flag.
//!
//! Suspensions are the source records; the user row carries the derived
//! state so the hot read path is a single primary-key lookup. Expiry is
//! evaluated on read, so a temporary suspension stops blocking once the
//! clock passes `suspended_until` with no write.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use warden_common::{AppResult, SharedClock};
use warden_db::{
    entities::{suspension, user},
    repositories::{SuspensionRepository, TrustStateUpdate, UserRepository},
};

use super::outcome::Degradation;

/// Trust state derived from a user's suspensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveTrustState {
    pub is_suspended: bool,
    /// Latest expiry among effective temporary suspensions. `None` when
    /// not suspended or when any effective suspension is open-ended.
    pub suspended_until: Option<DateTime<Utc>>,
}

impl From<EffectiveTrustState> for TrustStateUpdate {
    fn from(state: EffectiveTrustState) -> Self {
        Self {
            is_suspended: state.is_suspended,
            suspended_until: state.suspended_until,
        }
    }
}

/// Reduce a user's suspensions to one effective state at `now`.
#[must_use]
pub fn compute_trust_state(
    suspensions: &[suspension::Model],
    now: DateTime<Utc>,
) -> EffectiveTrustState {
    let mut is_suspended = false;
    let mut open_ended = false;
    let mut latest: Option<DateTime<Utc>> = None;

    for s in suspensions.iter().filter(|s| s.is_effective_at(now)) {
        is_suspended = true;
        match s.expires_at {
            Some(at) if s.kind.is_timed() => {
                let at = at.with_timezone(&Utc);
                latest = Some(latest.map_or(at, |cur| cur.max(at)));
            }
            _ => open_ended = true,
        }
    }

    EffectiveTrustState {
        is_suspended,
        suspended_until: if open_ended { None } else { latest },
    }
}

/// Evaluate the synchronized columns of a user row at `now`.
///
/// A stale row counts as blocked until a recompute clears it.
#[must_use]
pub fn is_blocked_at(user: &user::Model, now: DateTime<Utc>) -> bool {
    if user.trust_state_stale {
        return true;
    }
    user.is_suspended && user.suspended_until.is_none_or(|until| now < until)
}

/// Synchronized trust columns of a user as seen at a point in time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustStateView {
    pub user_id: String,
    pub is_blocked: bool,
    pub is_suspended: bool,
    pub suspended_until: Option<DateTime<Utc>>,
    pub stale: bool,
    pub synced_at: Option<DateTime<Utc>>,
}

/// Owns the derived trust columns on the user row.
#[derive(Clone)]
pub struct TrustStateStore {
    user_repo: UserRepository,
    suspension_repo: SuspensionRepository,
    clock: SharedClock,
    attempts: u32,
}

impl TrustStateStore {
    #[must_use]
    pub const fn new(
        user_repo: UserRepository,
        suspension_repo: SuspensionRepository,
        clock: SharedClock,
        attempts: u32,
    ) -> Self {
        Self {
            user_repo,
            suspension_repo,
            clock,
            attempts,
        }
    }

    /// Re-derive the user's trust state from all of their suspensions and
    /// write it back. Idempotent.
    pub async fn recompute(&self, user_id: &str) -> AppResult<EffectiveTrustState> {
        let suspensions = self.suspension_repo.find_by_user(user_id).await?;
        let now = self.clock.now();
        let state = compute_trust_state(&suspensions, now);

        self.user_repo
            .write_trust_state(user_id, state.into(), now)
            .await?;

        debug!(
            user_id = %user_id,
            is_suspended = state.is_suspended,
            suspended_until = ?state.suspended_until,
            "Trust state recomputed"
        );

        Ok(state)
    }

    /// [`Self::recompute`], attempted up to the configured number of times.
    pub async fn recompute_with_retry(&self, user_id: &str) -> AppResult<EffectiveTrustState> {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.recompute(user_id).await {
                Ok(state) => return Ok(state),
                Err(e) if attempt < attempts => {
                    warn!(user_id = %user_id, attempt, error = %e, "Trust recompute failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Whether the user is currently blocked from acting. Never recomputes.
    pub async fn is_blocked(&self, user_id: &str) -> AppResult<bool> {
        let user = self.user_repo.get_by_id(user_id).await?;
        Ok(is_blocked_at(&user, self.clock.now()))
    }

    /// Synchronized trust columns with the blocked verdict at the current time.
    pub async fn view(&self, user_id: &str) -> AppResult<TrustStateView> {
        let user = self.user_repo.get_by_id(user_id).await?;
        let is_blocked = is_blocked_at(&user, self.clock.now());

        Ok(TrustStateView {
            user_id: user.id,
            is_blocked,
            is_suspended: user.is_suspended,
            suspended_until: user.suspended_until.map(|at| at.with_timezone(&Utc)),
            stale: user.trust_state_stale,
            synced_at: user.trust_synced_at.map(|at| at.with_timezone(&Utc)),
        })
    }

    /// Force the user into the blocked state until a recompute succeeds.
    pub async fn mark_blocked_pending(&self, user_id: &str) -> AppResult<()> {
        self.user_repo
            .mark_blocked_pending(user_id, self.clock.now())
            .await
    }

    /// Catch-up after a new suspension was stored. If the recompute keeps
    /// failing the user is marked blocked-pending so the flag never
    /// under-blocks.
    ///
    /// Runs on its own task: the suspension is already committed, so the
    /// catch-up must finish even if the caller is dropped mid-way.
    pub async fn sync_after_suspend(&self, user_id: &str) -> Option<Degradation> {
        let store = self.clone();
        let user_id = user_id.to_string();
        Self::join(tokio::spawn(async move { store.catch_up_after_suspend(&user_id).await })).await
    }

    /// Catch-up after a suspension was lifted or removed. On failure the
    /// previous flag is left in place. Detached like
    /// [`Self::sync_after_suspend`].
    pub async fn sync_after_release(&self, user_id: &str) -> Option<Degradation> {
        let store = self.clone();
        let user_id = user_id.to_string();
        Self::join(tokio::spawn(async move { store.catch_up_after_release(&user_id).await })).await
    }

    async fn catch_up_after_suspend(&self, user_id: &str) -> Option<Degradation> {
        let err = self.recompute_with_retry(user_id).await.err()?;
        error!(user_id = %user_id, error = %err, "Trust recompute failed after suspension");

        if let Err(e) = self.mark_blocked_pending(user_id).await {
            error!(user_id = %user_id, error = %e, "Failed to mark user blocked-pending");
        }

        Some(Degradation::TrustStateStale)
    }

    async fn catch_up_after_release(&self, user_id: &str) -> Option<Degradation> {
        let err = self.recompute_with_retry(user_id).await.err()?;
        error!(user_id = %user_id, error = %err, "Trust recompute failed after release");
        Some(Degradation::TrustStateStale)
    }

    async fn join(task: JoinHandle<Option<Degradation>>) -> Option<Degradation> {
        task.await.unwrap_or_else(|e| {
            error!(error = %e, "Trust state catch-up task failed");
            Some(Degradation::TrustStateStale)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, DatabaseConnection, DbErr, MockDatabase, MockExecResult};
    use std::sync::Arc;
    use warden_common::{AppError, Clock, ManualClock};
    use warden_db::{entities::suspension::SuspensionKind, test_utils::into_transaction_log};

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

    fn user_row(
        is_suspended: bool,
        suspended_until: Option<DateTime<Utc>>,
        stale: bool,
        now: DateTime<Utc>,
    ) -> user::Model {
        user::Model {
            id: "user1".to_string(),
            username: "alice".to_string(),
            is_admin: false,
            is_moderator: false,
            is_suspended,
            suspended_until: suspended_until.map(Into::into),
            trust_state_stale: stale,
            trust_synced_at: None,
            created_at: now.into(),
            updated_at: None,
        }
    }

    fn store(db: MockDatabase, clock: ManualClock) -> TrustStateStore {
        store_on(&Arc::new(db.into_connection()), clock)
    }

    fn store_on(conn: &Arc<DatabaseConnection>, clock: ManualClock) -> TrustStateStore {
        TrustStateStore::new(
            UserRepository::new(Arc::clone(conn)),
            SuspensionRepository::new(Arc::clone(conn)),
            Arc::new(clock),
            2,
        )
    }

    fn exec_ok(rows: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: rows,
        }
    }

    #[test]
    fn test_compute_no_suspensions() {
        let now = ManualClock::from_recent().now();
        let state = compute_trust_state(&[], now);
        assert!(!state.is_suspended);
        assert!(state.suspended_until.is_none());
    }

    #[test]
    fn test_compute_takes_latest_expiry() {
        let now = ManualClock::from_recent().now();
        let state = compute_trust_state(
            &[
                suspension_row("s1", SuspensionKind::Temporary, Some(now + Duration::days(1)), now),
                suspension_row("s2", SuspensionKind::Temporary, Some(now + Duration::days(7)), now),
            ],
            now,
        );

        assert!(state.is_suspended);
        assert_eq!(state.suspended_until, Some(now + Duration::days(7)));
    }

    #[test]
    fn test_compute_permanent_is_open_ended() {
        let now = ManualClock::from_recent().now();
        let state = compute_trust_state(
            &[
                suspension_row("s1", SuspensionKind::Temporary, Some(now + Duration::days(7)), now),
                suspension_row("s2", SuspensionKind::Permanent, None, now),
            ],
            now,
        );

        assert!(state.is_suspended);
        assert!(state.suspended_until.is_none());
    }

    #[test]
    fn test_compute_ignores_lifted_and_expired() {
        let now = ManualClock::from_recent().now();
        let mut lifted = suspension_row("s1", SuspensionKind::Permanent, None, now);
        lifted.is_active = false;
        let expired =
            suspension_row("s2", SuspensionKind::Temporary, Some(now - Duration::hours(1)), now);

        let state = compute_trust_state(&[lifted, expired], now);
        assert!(!state.is_suspended);
    }

    #[test]
    fn test_is_blocked_at_expiry_boundary() {
        let now = ManualClock::from_recent().now();
        let until = now + Duration::days(7);
        let user = user_row(true, Some(until), false, now);

        assert!(is_blocked_at(&user, now));
        assert!(is_blocked_at(&user, until - Duration::seconds(1)));
        assert!(!is_blocked_at(&user, until));
    }

    #[test]
    fn test_is_blocked_when_stale() {
        let now = ManualClock::from_recent().now();
        assert!(is_blocked_at(&user_row(false, None, true, now), now));
        assert!(!is_blocked_at(&user_row(false, None, false, now), now));
    }

    #[tokio::test]
    async fn test_is_blocked_is_read_only() {
        let clock = ManualClock::from_recent();
        let now = clock.now();
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[user_row(
            true,
            Some(now + Duration::days(7)),
            false,
            now,
        )]]);

        let store = store(db, clock);
        assert!(store.is_blocked("user1").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_blocked_unknown_user() {
        let clock = ManualClock::from_recent();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()]);

        let store = store(db, clock);
        let result = store.is_blocked("ghost").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_recompute_retries_once() {
        let clock = ManualClock::from_recent();
        let now = clock.now();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([
                [suspension_row("s1", SuspensionKind::Permanent, None, now)],
                [suspension_row("s1", SuspensionKind::Permanent, None, now)],
            ])
            .append_exec_errors([DbErr::Custom("deadlock detected".to_string())])
            .append_exec_results([exec_ok(1)]);

        let store = store(db, clock);
        let state = store.recompute_with_retry("user1").await.unwrap();

        assert!(state.is_suspended);
        assert!(state.suspended_until.is_none());
    }

    #[tokio::test]
    async fn test_sync_after_suspend_marks_blocked_pending() {
        let clock = ManualClock::from_recent();
        let now = clock.now();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([
                [suspension_row("s1", SuspensionKind::Permanent, None, now)],
                [suspension_row("s1", SuspensionKind::Permanent, None, now)],
            ])
            .append_exec_errors([
                DbErr::Custom("connection reset".to_string()),
                DbErr::Custom("connection reset".to_string()),
            ])
            .append_exec_results([exec_ok(1)]);

        let store = store(db, clock);
        let degraded = store.sync_after_suspend("user1").await;

        assert_eq!(degraded, Some(Degradation::TrustStateStale));
    }

    #[tokio::test]
    async fn test_sync_after_release_success() {
        let clock = ManualClock::from_recent();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<suspension::Model>::new()])
            .append_exec_results([exec_ok(1)]);

        let store = store(db, clock);
        assert!(store.sync_after_release("user1").await.is_none());
    }

    #[tokio::test]
    async fn test_sync_after_suspend_survives_dropped_caller() {
        let clock = ManualClock::from_recent();
        let now = clock.now();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[suspension_row("s1", SuspensionKind::Permanent, None, now)]])
            .append_exec_results([exec_ok(1)]);
        let conn = Arc::new(db.into_connection());
        let store = store_on(&conn, clock);

        // Polled once, then dropped, as a request timeout would.
        let mut sync = Box::pin(store.sync_after_suspend("user1"));
        assert!(futures::poll!(&mut sync).is_pending());
        drop(sync);
        drop(store);

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let statements: Vec<String> = into_transaction_log(conn)
            .iter()
            .flat_map(sea_orm::Transaction::statements)
            .map(|stmt| stmt.sql.clone())
            .collect();
        assert_eq!(statements.len(), 2);
        assert!(statements[1].starts_with(r#"UPDATE "user""#));
    }
}
