use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub orders_created_total: IntCounterVec,
    pub status_transitions_total: IntCounterVec,
    pub notifications_total: IntCounterVec,
    pub cached_orders: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let orders_created_total = IntCounterVec::new(
            Opts::new("orders_created_total", "Order creation attempts by outcome"),
            &["outcome"],
        )
        .expect("valid orders_created_total metric");

        let status_transitions_total = IntCounterVec::new(
            Opts::new(
                "status_transitions_total",
                "Persisted status transitions by target status",
            ),
            &["status"],
        )
        .expect("valid status_transitions_total metric");

        let notifications_total = IntCounterVec::new(
            Opts::new("notifications_total", "Notification attempts by outcome"),
            &["outcome"],
        )
        .expect("valid notifications_total metric");

        let cached_orders = IntGauge::new("cached_orders", "Orders currently held in the cache")
            .expect("valid cached_orders metric");

        registry
            .register(Box::new(orders_created_total.clone()))
            .expect("register orders_created_total");
        registry
            .register(Box::new(status_transitions_total.clone()))
            .expect("register status_transitions_total");
        registry
            .register(Box::new(notifications_total.clone()))
            .expect("register notifications_total");
        registry
            .register(Box::new(cached_orders.clone()))
            .expect("register cached_orders");

        Self {
            registry,
            orders_created_total,
            status_transitions_total,
            notifications_total,
            cached_orders,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
