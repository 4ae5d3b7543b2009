//! API endpoints.

mod filters;
mod moderation_log;
mod reports;
mod suspensions;
mod users;
mod warnings;

use axum::{Router, middleware::from_fn};

use crate::middleware::{AppState, actor_middleware};

/// Default page size for list endpoints.
const fn default_limit() -> u64 {
    10
}

/// Largest page a list endpoint returns.
const MAX_LIMIT: u64 = 100;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/admin/suspensions", suspensions::router())
        .nest("/admin/warnings", warnings::router())
        .nest("/admin/reports", reports::admin_router())
        .nest("/admin/filters", filters::admin_router())
        .nest("/admin/moderation-log", moderation_log::router())
        .nest("/reports", reports::router())
        .nest("/filters", filters::router())
        .nest("/users", users::router())
        .layer(from_fn(actor_middleware))
}
