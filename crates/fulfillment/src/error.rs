//! Fulfillment error types.

use std::time::Duration;

use common::{OrderId, ProductId};
use domain::{InventoryError, OrderError, OrderStatus};
use store::StoreError;
use thiserror::Error;

/// Coarse classification of a [`FulfillmentError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, rejected before any storage mutation.
    Validation,
    /// A business rule refused the request.
    Business,
    /// Storage or infrastructure failure.
    Internal,
}

/// Errors that can occur during fulfillment operations.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// The request was malformed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Not enough available stock for a line.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// A line referenced a product missing from the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order belongs to another user.
    #[error("Order {0} does not belong to the requesting user")]
    Forbidden(OrderId),

    /// The requested status change is not allowed.
    #[error("Invalid status transition: cannot transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The caller stopped waiting. The placement may still commit.
    #[error("Request cancelled before the order completed")]
    Cancelled,

    /// The caller's wait bound elapsed. The placement may still commit.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The payment authorizer failed.
    #[error("Payment service error: {0}")]
    Payment(String),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Stored state contradicts an invariant.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FulfillmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FulfillmentError::Validation(_) => ErrorKind::Validation,
            FulfillmentError::InsufficientStock { .. }
            | FulfillmentError::ProductNotFound(_)
            | FulfillmentError::OrderNotFound(_)
            | FulfillmentError::Forbidden(_)
            | FulfillmentError::InvalidTransition { .. }
            | FulfillmentError::Cancelled
            | FulfillmentError::Timeout(_) => ErrorKind::Business,
            FulfillmentError::Payment(_)
            | FulfillmentError::Store(_)
            | FulfillmentError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            FulfillmentError::Validation(_) => "VALIDATION_FAILED",
            FulfillmentError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            FulfillmentError::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            FulfillmentError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            FulfillmentError::Forbidden(_) => "FORBIDDEN",
            FulfillmentError::InvalidTransition { .. } => "INVALID_STATUS_TRANSITION",
            FulfillmentError::Cancelled => "REQUEST_CANCELLED",
            FulfillmentError::Timeout(_) => "REQUEST_TIMEOUT",
            FulfillmentError::Payment(_)
            | FulfillmentError::Store(_)
            | FulfillmentError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<OrderError> for FulfillmentError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidTransition { from, to } => {
                FulfillmentError::InvalidTransition { from, to }
            }
            other => FulfillmentError::Validation(other.to_string()),
        }
    }
}

impl From<InventoryError> for FulfillmentError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::InsufficientStock {
                product_id,
                requested,
                available,
            } => FulfillmentError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            other @ InventoryError::ReservedOverflow { .. } => {
                FulfillmentError::Validation(other.to_string())
            }
            other @ InventoryError::ReleaseExceedsReserved { .. } => {
                FulfillmentError::Internal(other.to_string())
            }
        }
    }
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
