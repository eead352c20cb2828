//! Best-effort customer notifications for order events.
//!
//! The dispatcher subscribes to the engine's event channel and makes a
//! single delivery attempt per event. Nothing here reports back to the
//! engine: a failed send is logged and counted, never retried.

pub mod content;
pub mod log_transport;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::models::event::OrderEvent;
use crate::models::user::UserProfile;
use crate::notify::content::notification_for;
use crate::observability::metrics::Metrics;
use crate::store::{RecordStore, USERS};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("profile lookup failed: {0}")]
    Profile(String),

    #[error("push transport failed: {0}")]
    Transport(String),
}

/// Runtime surface the service is running on. Push delivery is not
/// available on `Web`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Platform {
    #[default]
    Server,
    Web,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Server => f.write_str("server"),
            Platform::Web => f.write_str("web"),
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "server" => Ok(Platform::Server),
            "web" => Ok(Platform::Web),
            other => Err(format!("unknown platform: {other}, expected server/web")),
        }
    }
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(
        &self,
        token: &str,
        title: &str,
        body: &str,
        payload: Value,
    ) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    SkippedPlatform,
    NoToken,
}

impl DispatchOutcome {
    fn as_label(&self) -> &'static str {
        match self {
            DispatchOutcome::Sent => "sent",
            DispatchOutcome::SkippedPlatform => "skipped_platform",
            DispatchOutcome::NoToken => "no_token",
        }
    }
}

pub struct NotificationDispatcher {
    profiles: Arc<dyn RecordStore>,
    transport: Arc<dyn PushTransport>,
    platform: Platform,
    metrics: Metrics,
}

impl NotificationDispatcher {
    pub fn new(
        profiles: Arc<dyn RecordStore>,
        transport: Arc<dyn PushTransport>,
        platform: Platform,
        metrics: Metrics,
    ) -> Self {
        Self {
            profiles,
            transport,
            platform,
            metrics,
        }
    }

    /// Makes one delivery attempt for `event` to the order owner's token.
    pub async fn dispatch(&self, event: &OrderEvent) -> Result<DispatchOutcome, NotifyError> {
        if self.platform == Platform::Web {
            return Ok(DispatchOutcome::SkippedPlatform);
        }

        let order = event.order();
        let Some(profile) = self.profile(&order.user_id).await? else {
            debug!(user_id = %order.user_id, "no profile record; nothing to notify");
            return Ok(DispatchOutcome::NoToken);
        };
        let Some(token) = profile.push_token.as_deref().filter(|t| !t.is_empty()) else {
            debug!(user_id = %order.user_id, "no push token registered; nothing to notify");
            return Ok(DispatchOutcome::NoToken);
        };

        let content = notification_for(event, profile.language);
        self.transport
            .send(token, &content.title, &content.body, content.payload)
            .await?;

        Ok(DispatchOutcome::Sent)
    }

    /// Like [`dispatch`](Self::dispatch) but swallows and records failures.
    pub async fn deliver(&self, event: &OrderEvent) {
        let order_id = &event.order().id;
        match self.dispatch(event).await {
            Ok(outcome) => {
                self.metrics
                    .notifications_total
                    .with_label_values(&[outcome.as_label()])
                    .inc();
                debug!(order_id = %order_id, outcome = outcome.as_label(), "notification handled");
            }
            Err(err) => {
                self.metrics
                    .notifications_total
                    .with_label_values(&["error"])
                    .inc();
                warn!(order_id = %order_id, error = %err, "order notification failed");
            }
        }
    }

    async fn profile(&self, user_id: &str) -> Result<Option<UserProfile>, NotifyError> {
        let record = self
            .profiles
            .get(USERS, user_id)
            .await
            .map_err(|err| NotifyError::Profile(err.to_string()))?;

        record
            .map(serde_json::from_value::<UserProfile>)
            .transpose()
            .map_err(|err| NotifyError::Profile(err.to_string()))
    }
}

/// Delivers notifications for every event received until the engine goes away.
///
/// Each delivery runs on its own task so a slow or panicking transport does
/// not hold up later events.
pub async fn run_notification_dispatcher(
    dispatcher: Arc<NotificationDispatcher>,
    mut events_rx: broadcast::Receiver<OrderEvent>,
) {
    info!(platform = %dispatcher.platform, "notification dispatcher started");

    loop {
        match events_rx.recv().await {
            Ok(event) => {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move { dispatcher.deliver(&event).await });
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "notification dispatcher lagged; events dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }

    warn!("notification dispatcher stopped: event channel closed");
}
