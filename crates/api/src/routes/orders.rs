//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId};
use orders::{NewOrder, Order, OrderService, OrderStatus};
use payments::PaymentService;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::identity::{AdminCaller, Caller};

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub tracking_code: Option<String>,
}

#[derive(Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub customer_name: String,
    pub customer_email: String,
    pub items: Vec<OrderItemResponse>,
    pub items_count: u32,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub discount: Money,
    pub total: Money,
    pub shipping_address: orders::ShippingAddress,
    pub tracking_code: Option<String>,
    pub notes: String,
    pub status_history: Vec<StatusHistoryResponse>,
    pub created_at: DateTime<Utc>,
    pub can_be_cancelled: bool,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_sku: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub subtotal: Money,
}

#[derive(Serialize)]
pub struct StatusHistoryResponse {
    pub from_status: OrderStatus,
    pub to_status: OrderStatus,
    pub comment: String,
    pub changed_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        let items = order
            .items()
            .iter()
            .map(|item| OrderItemResponse {
                product_id: item.product_id,
                product_name: item.product_name.clone(),
                product_sku: item.product_sku.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                subtotal: item.subtotal,
            })
            .collect();
        let status_history = order
            .status_history()
            .iter()
            .map(|entry| StatusHistoryResponse {
                from_status: entry.from_status,
                to_status: entry.to_status,
                comment: entry.comment.clone(),
                changed_at: entry.changed_at,
            })
            .collect();

        Self {
            id: order.id(),
            order_number: order.order_number(),
            status: order.status(),
            customer_name: order.customer().name.clone(),
            customer_email: order.customer().email.clone(),
            items,
            items_count: order.items_count(),
            subtotal: order.subtotal(),
            shipping_cost: order.shipping_cost(),
            discount: order.discount(),
            total: order.total(),
            shipping_address: order.shipping_address().clone(),
            tracking_code: order.tracking_code().map(String::from),
            notes: order.notes().to_string(),
            status_history,
            created_at: order.created_at(),
            can_be_cancelled: order.can_be_cancelled(),
        }
    }
}

// -- Handlers --

/// POST /orders — place a new order for the caller.
#[tracing::instrument(skip(state, caller, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<NewOrder>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state
        .orders
        .create_order(&caller.user, &caller.identity, req)
        .await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /orders — list the caller's orders (all orders for admins).
#[tracing::instrument(skip(state, caller))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.orders.list_orders(&caller.user).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// GET /orders/:id — load an order by ID.
#[tracing::instrument(skip(state, caller))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.orders.get_order(&caller.user, id).await?;
    Ok(Json(order.into()))
}

/// POST /orders/:id/update-status — transition an order (admin only).
#[tracing::instrument(skip(state, caller, req))]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    caller: AdminCaller,
    Path(id): Path<OrderId>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .orders
        .update_status(
            id,
            req.status,
            req.comment,
            req.tracking_code,
            Some(caller.0.user.id),
        )
        .await?;
    Ok(Json(order.into()))
}

/// POST /orders/:id/cancel — cancel an order and release its stock.
#[tracing::instrument(skip(state, caller, req))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<OrderId>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let reason = if req.reason.is_empty() {
        "cancelled by customer".to_string()
    } else {
        req.reason
    };
    let order = state
        .orders
        .cancel_order(&caller.user, &caller.identity, id, reason)
        .await?;
    Ok(Json(order.into()))
}

/// GET /orders/statistics — aggregate figures (admin only).
#[tracing::instrument(skip(state, _caller))]
pub async fn statistics(
    State(state): State<Arc<AppState>>,
    _caller: AdminCaller,
) -> Result<Json<orders::OrderStatistics>, ApiError> {
    let stats = state.orders.statistics().await?;
    Ok(Json(stats))
}
