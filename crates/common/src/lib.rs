//! Shared types for the order fulfillment backend.

pub mod types;

pub use types::{NotificationId, OrderId, ProductId, UserId};
