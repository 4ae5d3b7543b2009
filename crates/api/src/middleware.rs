//! API middleware.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sea_orm::DatabaseConnection;
use tracing::warn;
use warden_common::{AppError, AppResult, SharedClock, config::ModerationConfig};
use warden_core::{
    Actor, AuditLog, ContentFilterCache, ContentFilterService, LifecycleService,
    NotificationDispatcher, NotificationTransport, ReportTriageService, Role, TrustStateStore,
};
use warden_db::repositories::{
    ContentFilterRuleRepository, ModerationLogRepository, ReportRepository, SuspensionRepository,
    UserRepository, WarningRepository,
};

/// Header carrying the acting user's id, set by the trusted gateway.
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// Header carrying the acting user's role (`admin`, `mod`, `user`).
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub lifecycle_service: LifecycleService,
    pub report_service: ReportTriageService,
    pub filter_service: ContentFilterService,
    pub filter_cache: Arc<ContentFilterCache>,
    pub trust_state: TrustStateStore,
    pub audit_log: AuditLog,
}

impl AppState {
    /// Wire every service onto one connection pool.
    pub fn new(
        db: Arc<DatabaseConnection>,
        moderation: &ModerationConfig,
        transport: Arc<dyn NotificationTransport>,
        clock: SharedClock,
    ) -> Self {
        let user_repo = UserRepository::new(Arc::clone(&db));
        let suspension_repo = SuspensionRepository::new(Arc::clone(&db));
        let warning_repo = WarningRepository::new(Arc::clone(&db));
        let report_repo = ReportRepository::new(Arc::clone(&db));
        let rule_repo = ContentFilterRuleRepository::new(Arc::clone(&db));
        let log_repo = ModerationLogRepository::new(db);

        let audit_log = AuditLog::new(log_repo, Arc::clone(&clock));
        let notifier = NotificationDispatcher::new(transport);
        let trust_state = TrustStateStore::new(
            user_repo.clone(),
            suspension_repo.clone(),
            Arc::clone(&clock),
            moderation.recompute_attempts,
        );

        let lifecycle_service = LifecycleService::new(
            suspension_repo,
            warning_repo,
            user_repo.clone(),
            trust_state.clone(),
            audit_log.clone(),
            notifier.clone(),
            Arc::clone(&clock),
        )
        .with_warning_expiry_days(moderation.warning_expiry_days);

        let report_service = ReportTriageService::new(
            report_repo,
            user_repo,
            audit_log.clone(),
            notifier,
            Arc::clone(&clock),
        );

        let filter_cache = Arc::new(ContentFilterCache::new(
            rule_repo.clone(),
            Arc::clone(&clock),
            moderation.default_replacement.clone(),
        ));
        let filter_service = ContentFilterService::new(
            rule_repo,
            Arc::clone(&filter_cache),
            audit_log.clone(),
            clock,
        );

        Self {
            lifecycle_service,
            report_service,
            filter_service,
            filter_cache,
            trust_state,
            audit_log,
        }
    }
}

/// Read the actor from gateway headers. `None` when no id is present.
pub fn actor_from_headers(headers: &HeaderMap) -> AppResult<Option<Actor>> {
    let Some(id) = headers.get(ACTOR_ID_HEADER) else {
        return Ok(None);
    };
    let id = id
        .to_str()
        .map_err(|_| AppError::Validation("Invalid actor id header".to_string()))?
        .trim();
    if id.is_empty() {
        return Ok(None);
    }

    let role = match headers.get(ACTOR_ROLE_HEADER) {
        Some(value) => value
            .to_str()
            .map_err(|_| AppError::Validation("Invalid actor role header".to_string()))?
            .parse::<Role>()?,
        None => Role::User,
    };

    Ok(Some(Actor::new(id, role)))
}

/// Actor middleware. The gateway has already authenticated the caller; this
/// only attaches the identity it forwarded.
pub async fn actor_middleware(mut req: Request<Body>, next: Next) -> Response {
    match actor_from_headers(req.headers()) {
        Ok(Some(actor)) => {
            req.extensions_mut().insert(actor);
        }
        Ok(None) => {}
        Err(e) => {
            warn!(error = %e, path = %req.uri().path(), "Rejected malformed actor headers");
            return e.into_response();
        }
    }

    next.run(req).await
}
