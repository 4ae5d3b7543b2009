//! Best-effort notification of users affected by moderation actions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tracing::{debug, info, warn};
use warden_common::{
    AppError, AppResult, SharedClock,
    config::{NotificationConfig, NotificationTransportKind},
};
use warden_db::entities::{report::ReportStatus, suspension::SuspensionKind};

use super::outcome::Degradation;

/// Message sent to an affected user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModerationNotice {
    Suspended {
        suspension_id: String,
        kind: SuspensionKind,
        reason: String,
        expires_at: Option<DateTime<Utc>>,
    },
    SuspensionLifted {
        suspension_id: String,
    },
    Warned {
        warning_id: String,
        reason: String,
        points: i32,
        expires_at: DateTime<Utc>,
    },
    /// Sent to the reporter when triage closes their report.
    ReportClosed {
        report_id: String,
        status: ReportStatus,
    },
}

impl ModerationNotice {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Suspended { .. } => "suspended",
            Self::SuspensionLifted { .. } => "suspension_lifted",
            Self::Warned { .. } => "warned",
            Self::ReportClosed { .. } => "report_closed",
        }
    }
}

/// Delivers notices to users. Implementations may be slow or fail; the
/// dispatcher never lets that affect the action that triggered them.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn deliver(&self, user_id: &str, notice: &ModerationNotice) -> AppResult<()>;
}

/// Drops every notice.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpNotificationTransport;

#[async_trait]
impl NotificationTransport for NoOpNotificationTransport {
    async fn deliver(&self, _user_id: &str, _notice: &ModerationNotice) -> AppResult<()> {
        Ok(())
    }
}

/// Writes notices to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotificationTransport;

#[async_trait]
impl NotificationTransport for LogNotificationTransport {
    async fn deliver(&self, user_id: &str, notice: &ModerationNotice) -> AppResult<()> {
        info!(user_id = %user_id, notice = notice.kind(), ?notice, "Moderation notice");
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload<'a> {
    user_id: &'a str,
    timestamp: String,
    notice: &'a ModerationNotice,
}

/// POSTs notices as signed JSON to a fixed endpoint.
#[derive(Clone)]
pub struct WebhookNotificationTransport {
    http_client: reqwest::Client,
    url: String,
    secret: Option<String>,
    clock: SharedClock,
}

impl WebhookNotificationTransport {
    pub fn new(url: String, secret: Option<String>, clock: SharedClock) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            url,
            secret,
            clock,
        })
    }

    fn sign_payload(secret: &str, payload: &str) -> AppResult<String> {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .map_err(|e| AppError::Internal(format!("Invalid signing key: {e}")))?;
        mac.update(payload.as_bytes());

        Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
    }
}

#[async_trait]
impl NotificationTransport for WebhookNotificationTransport {
    async fn deliver(&self, user_id: &str, notice: &ModerationNotice) -> AppResult<()> {
        let payload = serde_json::to_string(&WebhookPayload {
            user_id,
            timestamp: self.clock.now().to_rfc3339(),
            notice,
        })
        .map_err(|e| AppError::Internal(format!("Failed to serialize notice: {e}")))?;

        let mut request = self
            .http_client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("User-Agent", "Warden-Notify/1.0");

        if let Some(secret) = &self.secret {
            request = request.header("X-Warden-Signature", Self::sign_payload(secret, &payload)?);
        }

        let response = request
            .body(payload)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Request failed: {e}")))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::ExternalService(format!(
                "HTTP {}",
                response.status()
            )))
        }
    }
}

/// Build the transport selected in configuration.
pub fn transport_from_config(
    config: &NotificationConfig,
    clock: SharedClock,
) -> AppResult<Arc<dyn NotificationTransport>> {
    match config.transport {
        NotificationTransportKind::None => Ok(Arc::new(NoOpNotificationTransport)),
        NotificationTransportKind::Log => Ok(Arc::new(LogNotificationTransport)),
        NotificationTransportKind::Webhook => {
            let url = config.webhook_url.clone().ok_or_else(|| {
                AppError::Config("notifications.webhook_url is required for the webhook transport".to_string())
            })?;
            Ok(Arc::new(WebhookNotificationTransport::new(
                url,
                config.webhook_secret.clone(),
                clock,
            )?))
        }
    }
}

/// Fire-and-forget front for a [`NotificationTransport`].
#[derive(Clone)]
pub struct NotificationDispatcher {
    transport: Arc<dyn NotificationTransport>,
}

impl NotificationDispatcher {
    #[must_use]
    pub fn new(transport: Arc<dyn NotificationTransport>) -> Self {
        Self { transport }
    }

    /// Dispatcher that drops everything.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Arc::new(NoOpNotificationTransport))
    }

    /// Deliver a notice. Failure is logged and reported, never raised.
    pub async fn notify(&self, user_id: &str, notice: ModerationNotice) -> Option<Degradation> {
        match self.transport.deliver(user_id, &notice).await {
            Ok(()) => {
                debug!(user_id = %user_id, notice = notice.kind(), "Notice delivered");
                None
            }
            Err(e) => {
                warn!(
                    error = %e,
                    user_id = %user_id,
                    notice = notice.kind(),
                    "Failed to deliver moderation notice"
                );
                Some(Degradation::NotificationPending)
            }
        }
    }
}
