use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::{NotifyError, PushTransport};

/// Transport that only records messages in the log. Used when no push
/// gateway is wired in.
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl PushTransport for LogTransport {
    async fn send(
        &self,
        token: &str,
        title: &str,
        body: &str,
        payload: Value,
    ) -> Result<(), NotifyError> {
        info!(token, title, body, payload = %payload, "push notification");
        Ok(())
    }
}
