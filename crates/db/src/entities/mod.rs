//! Database entities.

#![allow(missing_docs)]

pub mod content_filter_rule;
pub mod moderation_log;
pub mod report;
pub mod suspension;
pub mod user;
pub mod warning;

pub use content_filter_rule::Entity as ContentFilterRule;
pub use moderation_log::Entity as ModerationLog;
pub use report::Entity as Report;
pub use suspension::Entity as Suspension;
pub use user::Entity as User;
pub use warning::Entity as Warning;
