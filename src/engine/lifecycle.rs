//! Order lifecycle engine.
//!
//! Owns order creation and status transitions. Each mutation is persisted
//! through the [`OrderStore`] before the cache changes, and only then is an
//! [`OrderEvent`] published. Notification delivery lives behind that event
//! channel, so its failures cannot reach the caller.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::descriptions::status_description;
use crate::engine::numbering::OrderNumberGenerator;
use crate::engine::transitions::TransitionPolicy;
use crate::error::AppError;
use crate::identity::IdentityProvider;
use crate::models::event::OrderEvent;
use crate::models::order::{
    Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress,
    StatusHistoryEntry,
};
use crate::models::user::Identity;
use crate::observability::metrics::Metrics;
use crate::store::cache::OrderStore;
use crate::store::RecordStore;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub transition_policy: TransitionPolicy,
    pub estimated_delivery: Duration,
    pub event_buffer_size: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            transition_policy: TransitionPolicy::Permissive,
            estimated_delivery: Duration::days(3),
            event_buffer_size: 1024,
        }
    }
}

pub struct NewOrder {
    pub items: Vec<OrderItem>,
    pub total: f64,
    pub address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

pub struct OrderEngine {
    store: OrderStore,
    identity: Arc<dyn IdentityProvider>,
    events_tx: broadcast::Sender<OrderEvent>,
    numbers: OrderNumberGenerator,
    settings: EngineSettings,
    metrics: Metrics,
}

impl OrderEngine {
    pub fn new(
        backend: Arc<dyn RecordStore>,
        identity: Arc<dyn IdentityProvider>,
        settings: EngineSettings,
        metrics: Metrics,
    ) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(settings.event_buffer_size.max(1));

        Self {
            store: OrderStore::new(backend),
            identity,
            events_tx,
            numbers: OrderNumberGenerator::new(),
            settings,
            metrics,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.events_tx.subscribe()
    }

    pub fn store(&self) -> &OrderStore {
        &self.store
    }

    /// Reloads or clears the cache after a sign-in or sign-out.
    pub async fn on_identity_changed(&self, identity: Option<&Identity>) -> Result<(), AppError> {
        match identity {
            Some(identity) => {
                let loaded = self.store.load_for_owner(&identity.id).await;
                // The cache was emptied before the query, so report that even on failure.
                self.refresh_cache_gauge();
                let loaded = loaded?;
                info!(user_id = %identity.id, orders = loaded, "orders loaded for signed-in user");
            }
            None => {
                self.store.clear();
                info!("signed out; order cache cleared");
            }
        }

        self.refresh_cache_gauge();
        Ok(())
    }

    pub async fn create_order(&self, owner_id: &str, new_order: NewOrder) -> Result<Order, AppError> {
        self.ensure_signed_in_as(owner_id)?;
        validate_new_order(&new_order)?;

        let now = Utc::now();
        let estimated_delivery = now
            .checked_add_signed(self.settings.estimated_delivery)
            .ok_or_else(|| {
                AppError::NotConfigured(format!(
                    "estimated delivery offset of {} days is out of range",
                    self.settings.estimated_delivery.num_days()
                ))
            })?;
        let numbers = self.numbers.generate(now);
        let order = Order {
            id: Uuid::new_v4().to_string(),
            order_number: numbers.order_number,
            tracking_number: numbers.tracking_number,
            user_id: owner_id.to_string(),
            items: new_order.items,
            total: new_order.total,
            address: new_order.address,
            payment_method: new_order.payment_method,
            payment_status: PaymentStatus::Pending,
            status: OrderStatus::Pending,
            status_history: vec![StatusHistoryEntry {
                status: OrderStatus::Pending,
                timestamp: now,
                description: status_description(OrderStatus::Pending),
            }],
            estimated_delivery,
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = self.store.create(&order).await {
            self.metrics
                .orders_created_total
                .with_label_values(&["error"])
                .inc();
            error!(user_id = owner_id, error = %err, "failed to persist new order");
            return Err(err.into());
        }

        self.metrics
            .orders_created_total
            .with_label_values(&["success"])
            .inc();
        self.refresh_cache_gauge();

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            user_id = owner_id,
            total = order.total,
            "order created"
        );

        let _ = self.events_tx.send(OrderEvent::Created {
            order: order.clone(),
        });

        Ok(order)
    }

    /// Appends `new_status` to the order's history and persists it.
    ///
    /// Returns `Ok(None)` when the order is not in the cache; nothing is
    /// written in that case.
    pub async fn update_order_status(
        &self,
        order_id: &str,
        new_status: OrderStatus,
    ) -> Result<Option<Order>, AppError> {
        let Some(mut order) = self.store.get(order_id) else {
            warn!(order_id, status = %new_status, "status update for unknown order ignored");
            return Ok(None);
        };

        let previous = order.status;
        self.settings.transition_policy.check(previous, new_status)?;

        let now = Utc::now();
        order.status = new_status;
        order.updated_at = now;
        order.status_history.push(StatusHistoryEntry {
            status: new_status,
            timestamp: now,
            description: status_description(new_status),
        });

        if let Err(err) = self.store.persist_status(&order).await {
            error!(order_id, status = %new_status, error = %err, "failed to persist status change");
            return Err(err.into());
        }

        self.metrics
            .status_transitions_total
            .with_label_values(&[new_status.as_str()])
            .inc();

        info!(
            order_id,
            from = %previous,
            to = %new_status,
            history_len = order.status_history.len(),
            "order status updated"
        );

        let _ = self.events_tx.send(OrderEvent::StatusChanged {
            order: order.clone(),
            previous,
        });

        Ok(Some(order))
    }

    pub fn get_order_by_id(&self, id: &str) -> Option<Order> {
        self.store.get(id)
    }

    pub fn get_user_orders(&self, owner_id: &str) -> Vec<Order> {
        self.store.list_for_owner(owner_id)
    }

    fn ensure_signed_in_as(&self, owner_id: &str) -> Result<(), AppError> {
        match self.identity.current() {
            Some(identity) if identity.id == owner_id => Ok(()),
            Some(_) => Err(AppError::Unauthenticated("place an order for this account")),
            None => Err(AppError::Unauthenticated("place an order")),
        }
    }

    fn refresh_cache_gauge(&self) {
        self.metrics.cached_orders.set(self.store.len() as i64);
    }
}

fn validate_new_order(new_order: &NewOrder) -> Result<(), AppError> {
    if new_order.items.is_empty() {
        return Err(AppError::Validation("order must contain at least one item".to_string()));
    }

    for item in &new_order.items {
        if item.quantity == 0 {
            return Err(AppError::Validation(format!(
                "quantity for product {} must be >= 1",
                item.product.id
            )));
        }
        if !item.price.is_finite() || item.price < 0.0 {
            return Err(AppError::Validation(format!(
                "price for product {} must be a non-negative amount",
                item.product.id
            )));
        }
    }

    if !new_order.total.is_finite() || new_order.total < 0.0 {
        return Err(AppError::Validation("total must be a non-negative amount".to_string()));
    }

    let address = &new_order.address;
    let required = [
        ("name", &address.name),
        ("phone", &address.phone),
        ("line1", &address.line1),
        ("city", &address.city),
    ];
    if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(AppError::Validation(format!("address {field} cannot be empty")));
    }

    Ok(())
}
