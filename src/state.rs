use std::sync::Arc;

use chrono::Duration;

use crate::config::Config;
use crate::engine::lifecycle::{EngineSettings, OrderEngine};
use crate::identity::SessionIdentity;
use crate::notify::{NotificationDispatcher, PushTransport};
use crate::observability::metrics::Metrics;
use crate::store::RecordStore;

pub struct AppState {
    pub engine: Arc<OrderEngine>,
    pub session: Arc<SessionIdentity>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        config: &Config,
        backend: Arc<dyn RecordStore>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        let metrics = Metrics::new();
        let session = Arc::new(SessionIdentity::new());

        let settings = EngineSettings {
            transition_policy: config.transition_policy,
            // Out-of-range offsets surface as a configuration error on create.
            estimated_delivery: Duration::try_days(config.estimated_delivery_days)
                .unwrap_or(Duration::MAX),
            event_buffer_size: config.event_buffer_size,
        };
        let engine = Arc::new(OrderEngine::new(
            backend.clone(),
            session.clone(),
            settings,
            metrics.clone(),
        ));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            backend,
            transport,
            config.platform,
            metrics.clone(),
        ));

        Self {
            engine,
            session,
            dispatcher,
            metrics,
        }
    }
}
