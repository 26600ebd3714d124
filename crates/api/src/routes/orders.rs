//! Order endpoints.

use std::str::FromStr;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use domain::{Order, OrderLine, OrderStatus};
use fulfillment::{OrderEngine, OrderItem};
use hub::EventHub;
use serde::{Deserialize, Serialize};
use store::Store;

use crate::caller::Caller;
use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub engine: OrderEngine<S>,
    pub hub: EventHub,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub items: Vec<OrderLineResponse>,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

#[derive(Serialize)]
pub struct OrderStatusResponse {
    pub order_id: OrderId,
    pub status: OrderStatus,
}

impl From<&OrderLine> for OrderLineResponse {
    fn from(line: &OrderLine) -> Self {
        Self {
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
            line_total_cents: line.line_total().cents(),
        }
    }
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id(),
            user_id: order.user_id(),
            status: order.status(),
            items: order.lines().iter().map(OrderLineResponse::from).collect(),
            total_cents: order.total_amount().cents(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

// -- Handlers --

/// POST /orders: place an order for the caller.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + Clone>(
    State(state): State<std::sync::Arc<AppState<S>>>,
    caller: Caller,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let items = req
        .items
        .iter()
        .map(|item| OrderItem::new(item.product_id, item.quantity))
        .collect();

    let order = state.engine.create_order(caller.0, items).await?;

    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// GET /orders: list the caller's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone>(
    State(state): State<std::sync::Arc<AppState<S>>>,
    caller: Caller,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.engine.list_orders_by_user(caller.0).await?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// GET /orders/{id}: load one of the caller's orders.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone>(
    State(state): State<std::sync::Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.engine.get_order_for_user(order_id, caller.0).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// GET /orders/{id}/status
#[tracing::instrument(skip(state))]
pub async fn status<S: Store + Clone>(
    State(state): State<std::sync::Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderStatusResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let status = state.engine.get_order_status(order_id, caller.0).await?;
    Ok(Json(OrderStatusResponse { order_id, status }))
}

/// PUT /orders/{id}/cancel
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Store + Clone>(
    State(state): State<std::sync::Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.engine.cancel_order(order_id, caller.0).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// PUT /admin/orders/{id}/status: administrative status change. Role checks
/// are enforced by the gateway in front of `/admin`.
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S: Store + Clone>(
    State(state): State<std::sync::Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let status =
        OrderStatus::from_str(&req.status).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let order = state.engine.update_order_status(order_id, status).await?;
    Ok(Json(OrderResponse::from(&order)))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    OrderId::from_str(id).map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
