//! Order fulfillment engine.
//!
//! [`OrderEngine`] turns order requests into committed orders with reserved
//! stock, runs cancellation and administrative status changes under row
//! locks, and hands post-commit notifications to the
//! [`NotificationDispatcher`], which persists them and pushes live events
//! through the [`hub::EventHub`].

pub mod config;
pub mod engine;
pub mod error;
pub mod notifier;
pub mod payloads;
pub mod payment;

pub use config::EngineConfig;
pub use engine::{OrderEngine, OrderItem};
pub use error::{ErrorKind, FulfillmentError, Result};
pub use notifier::NotificationDispatcher;
pub use payloads::{InventoryPayload, OrderPayload};
pub use payment::{AlwaysApprove, InMemoryPaymentAuthorizer, PaymentAuthorizer, PaymentOutcome};
pub use tokio_util::sync::CancellationToken;
