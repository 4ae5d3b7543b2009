//! Repositories wrapping sea-orm queries.

#![allow(missing_docs)]

pub mod content_filter_rule;
pub mod moderation_log;
pub mod report;
pub mod suspension;
pub mod user;
pub mod warning;

pub use content_filter_rule::ContentFilterRuleRepository;
pub use moderation_log::{ModerationLogFilter, ModerationLogRepository};
pub use report::{CloseReport, ReportRepository};
pub use suspension::SuspensionRepository;
pub use user::{TrustStateUpdate, UserRepository};
pub use warning::WarningRepository;
