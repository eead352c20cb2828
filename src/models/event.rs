use serde::Serialize;

use crate::models::order::{Order, OrderStatus};

/// Published by the engine after a mutation has been persisted and cached.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Created {
        order: Order,
    },
    StatusChanged {
        order: Order,
        previous: OrderStatus,
    },
}

impl OrderEvent {
    pub fn order(&self) -> &Order {
        match self {
            OrderEvent::Created { order } => order,
            OrderEvent::StatusChanged { order, .. } => order,
        }
    }
}
