//! Domain error types.

use common::ProductId;
use thiserror::Error;

use crate::order::OrderStatus;

/// Errors raised by order validation and the status state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The requested status change is not in the transition table.
    #[error("Invalid status transition: cannot transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// A status string did not name a known status.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),

    /// An order was requested without any lines.
    #[error("Order has no items")]
    NoLines,

    /// A line was requested with a zero quantity.
    #[error("Invalid quantity for product {product_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// A line would push the order total past what can be represented.
    #[error("Order total overflows for product {product_id} with quantity {quantity}")]
    AmountOverflow { product_id: ProductId, quantity: u32 },
}

/// Errors raised by inventory reservation arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// Not enough available stock to back the requested quantity.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// A release would drive the reserved quantity below zero.
    #[error("Cannot release {requested} units of product {product_id}: only {reserved} reserved")]
    ReleaseExceedsReserved {
        product_id: ProductId,
        requested: u32,
        reserved: u32,
    },

    /// A reservation would push the reserved count past `u32::MAX`.
    #[error("Cannot reserve {requested} more units of product {product_id}: {reserved} already reserved")]
    ReservedOverflow {
        product_id: ProductId,
        requested: u32,
        reserved: u32,
    },
}
