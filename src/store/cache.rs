use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use super::{RecordStore, StoreError, ORDERS};
use crate::models::order::Order;

struct CachedOrder {
    /// Insertion rank; higher is more recent.
    rank: u64,
    order: Order,
}

/// Persistence and caching façade for orders.
///
/// Every write goes to the record store first; the cache is only touched
/// once the store has accepted it, so the cache is never ahead of durable
/// state. Transition legality is not this type's concern.
pub struct OrderStore {
    backend: Arc<dyn RecordStore>,
    cache: DashMap<String, CachedOrder>,
    next_rank: AtomicU64,
    /// Bumped whenever the cache is emptied; a write that started in an
    /// older generation must not land in the cache.
    generation: AtomicU64,
}

impl OrderStore {
    pub fn new(backend: Arc<dyn RecordStore>) -> Self {
        Self {
            backend,
            cache: DashMap::new(),
            next_rank: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    pub fn backend(&self) -> &Arc<dyn RecordStore> {
        &self.backend
    }

    /// Replaces the cache with the owner's persisted orders.
    ///
    /// The previous owner's orders are dropped before the query, so a failed
    /// load leaves the cache empty. Records that no longer decode as an
    /// [`Order`] are skipped with a warning.
    pub async fn load_for_owner(&self, owner_id: &str) -> Result<usize, StoreError> {
        self.clear();
        let generation = self.generation.load(Ordering::Acquire);
        let records = self.backend.query_by_owner(ORDERS, owner_id).await?;

        let orders: Vec<Order> = records
            .into_iter()
            .filter_map(|record| match serde_json::from_value::<Order>(record) {
                Ok(order) => Some(order),
                Err(err) => {
                    warn!(owner_id, error = %err, "skipping undecodable order record");
                    None
                }
            })
            .collect();

        if self.generation.load(Ordering::Acquire) != generation {
            debug!(owner_id, "identity changed during load; discarding results");
            return Ok(0);
        }

        // Store returns newest first; the oldest gets the lowest rank.
        for order in orders.into_iter().rev() {
            self.insert_front(order);
        }

        debug!(owner_id, orders = self.cache.len(), "order cache loaded");
        Ok(self.cache.len())
    }

    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.cache.clear();
    }

    pub async fn create(&self, order: &Order) -> Result<(), StoreError> {
        let record = serde_json::to_value(order)?;
        let generation = self.generation.load(Ordering::Acquire);
        self.backend.create(ORDERS, record, Some(&order.id)).await?;

        if self.generation.load(Ordering::Acquire) == generation {
            self.insert_front(order.clone());
        } else {
            debug!(order_id = %order.id, "cache cleared during create; not caching");
        }
        Ok(())
    }

    /// Writes the status fields of `order` and then swaps it into the cache.
    pub async fn persist_status(&self, order: &Order) -> Result<(), StoreError> {
        let patch = serde_json::to_value(order.status_patch())?;
        self.backend.update(ORDERS, &order.id, patch).await?;

        // A sign-out may have cleared the cache while the write was in flight.
        if let Some(mut cached) = self.cache.get_mut(&order.id) {
            cached.order = order.clone();
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Order> {
        self.cache.get(id).map(|cached| cached.order.clone())
    }

    /// Cached orders of `owner_id`, most recently created first.
    pub fn list_for_owner(&self, owner_id: &str) -> Vec<Order> {
        let mut ranked: Vec<(u64, Order)> = self
            .cache
            .iter()
            .filter(|entry| entry.order.user_id == owner_id)
            .map(|entry| (entry.rank, entry.order.clone()))
            .collect();

        ranked.sort_by(|a, b| b.0.cmp(&a.0));
        ranked.into_iter().map(|(_, order)| order).collect()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn insert_front(&self, order: Order) {
        let rank = self.next_rank.fetch_add(1, Ordering::Relaxed);
        self.cache.insert(order.id.clone(), CachedOrder { rank, order });
    }
}
