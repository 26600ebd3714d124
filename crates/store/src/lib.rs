//! Storage layer for orders, inventory, and notifications.
//!
//! All order-affecting work goes through a [`StoreTx`]: reads that feed a
//! stock decision take an exclusive row lock held until commit or rollback.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{Store, StoreTx};
