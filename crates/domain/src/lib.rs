//! Domain layer for the order fulfillment backend.
//!
//! This crate provides the core domain types:
//! - Order aggregate with its lines and status state machine
//! - Inventory records with reservation arithmetic
//! - Catalog products and user notifications

pub mod error;
pub mod inventory;
pub mod notification;
pub mod order;

pub use error::{InventoryError, OrderError};
pub use inventory::{InventoryRecord, Product};
pub use notification::{Notification, NotificationCategory};
pub use order::{Money, Order, OrderLine, OrderStatus};
