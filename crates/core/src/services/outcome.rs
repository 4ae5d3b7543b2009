//! Result of a staff mutation.
//!
//! The primary write is authoritative. The follow-up steps (trust recompute,
//! audit append, notification) are catch-ups; when one of them does not
//! complete the action still succeeds and the gap is reported here.

use serde::Serialize;

/// A catch-up step that did not complete after the primary write committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Degradation {
    /// The synchronized trust flag could not be recomputed.
    TrustStateStale,
    /// The moderation log entry could not be written.
    AuditDelayed,
    /// The affected user was not notified.
    NotificationPending,
}

/// Value produced by a staff mutation plus any degraded follow-ups.
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome<T> {
    pub value: T,
    pub degraded: Vec<Degradation>,
}

impl<T> ActionOutcome<T> {
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self {
            value,
            degraded: Vec::new(),
        }
    }

    /// Record a degradation, if any.
    #[must_use]
    pub fn with(mut self, degradation: Option<Degradation>) -> Self {
        if let Some(d) = degradation {
            if !self.degraded.contains(&d) {
                self.degraded.push(d);
            }
        }
        self
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ActionOutcome<U> {
        ActionOutcome {
            value: f(self.value),
            degraded: self.degraded,
        }
    }
}
