use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::api::rest::session::require_user;
use crate::engine::lifecycle::NewOrder;
use crate::error::AppError;
use crate::models::order::{Order, OrderItem, OrderStatus, PaymentMethod, ShippingAddress};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", patch(update_order_status))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItem>,
    pub total: f64,
    pub address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    let owner_id = require_user(&state, "place an order")?;

    let order = state
        .engine
        .create_order(
            &owner_id,
            NewOrder {
                items: payload.items,
                total: payload.total,
                address: payload.address,
                payment_method: payload.payment_method,
            },
        )
        .await?;

    Ok(Json(order))
}

async fn list_orders(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Order>>, AppError> {
    let owner_id = require_user(&state, "view your orders")?;
    Ok(Json(state.engine.get_user_orders(&owner_id)))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError> {
    state
        .engine
        .get_order_by_id(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))
}

async fn update_order_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, AppError> {
    state
        .engine
        .update_order_status(&id, payload.status)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))
}
