//! Live event payloads.

use common::{OrderId, ProductId};
use domain::{InventoryRecord, Order, OrderStatus, Product};
use serde::{Deserialize, Serialize};

/// Payload of `order_created`, `order_cancelled` and `order_status_updated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPayload {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub total_amount_cents: i64,
}

impl From<&Order> for OrderPayload {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id(),
            status: order.status(),
            total_amount_cents: order.total_amount().cents(),
        }
    }
}

/// Payload of `inventory_updated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryPayload {
    pub product_id: ProductId,
    pub name: String,
    pub available: u32,
    pub reserved: u32,
}

impl InventoryPayload {
    pub fn new(product: &Product, record: &InventoryRecord) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            available: record.available,
            reserved: record.reserved,
        }
    }
}
