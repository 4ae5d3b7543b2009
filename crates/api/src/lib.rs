//! HTTP API layer for warden.
//!
//! - **Endpoints**: POST-style JSON RPC under `/api`
//! - **Middleware**: gateway identity headers, application state
//! - **Extractors**: the acting user
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::AppState;
