//! Business logic services.

#![allow(missing_docs)]

pub mod actor;
pub mod audit;
pub mod content_filter;
pub mod lifecycle;
pub mod notification;
pub mod outcome;
pub mod report;
pub mod trust_state;

pub use actor::{Actor, Role};
pub use audit::{AuditLog, NewLogEntry};
pub use content_filter::{
    ContentFilterCache, ContentFilterService, CreateRuleInput, FilterOutcome, FilterSnapshot,
    SnapshotInfo, UpdateRuleInput,
};
pub use lifecycle::{
    EditSuspensionInput, EditWarningInput, LifecycleService, SuspendInput, SuspensionView,
    WarnInput,
};
pub use notification::{
    LogNotificationTransport, ModerationNotice, NoOpNotificationTransport, NotificationDispatcher,
    NotificationTransport, WebhookNotificationTransport, transport_from_config,
};
pub use outcome::{ActionOutcome, Degradation};
pub use report::{ReportTriageService, SubmitReportInput};
pub use trust_state::{EffectiveTrustState, TrustStateStore, TrustStateView};
