
use async_trait::async_trait;
use common::{OrderId, ProductId, UserId};
use domain::{InventoryRecord, Notification, Order, Product};

use crate::Result;

/// Core trait for store implementations.
///
/// A store hands out transactions for every order-affecting operation and
/// answers plain reads outside of any transaction. All implementations must
/// be thread-safe (Send + Sync).
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// The transaction type returned by [`Store::begin`].
    type Tx: StoreTx;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Loads an order with its lines.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Lists a user's orders, newest first.
    async fn list_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Looks up a catalog product.
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>>;

    /// Reads an inventory record without locking it.
    async fn get_inventory(&self, product_id: ProductId) -> Result<Option<InventoryRecord>>;

    /// Lists a user's notifications, newest first.
    async fn list_notifications(&self, user_id: UserId) -> Result<Vec<Notification>>;
}

/// A single storage transaction.
///
/// Dropping a transaction without calling [`StoreTx::commit`] rolls it back
/// and releases every lock it holds.
#[async_trait]
pub trait StoreTx: Send {
    /// Looks up a catalog product inside the transaction.
    async fn get_product(&mut self, product_id: ProductId) -> Result<Option<Product>>;

    /// Reads an inventory record and takes an exclusive lock on it.
    ///
    /// Locking a row the transaction already holds does not block.
    async fn lock_inventory(&mut self, product_id: ProductId) -> Result<Option<InventoryRecord>>;

    /// Writes an inventory record, creating it if absent.
    async fn save_inventory(&mut self, record: &InventoryRecord) -> Result<()>;

    /// Inserts a new order together with its lines.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Reads an order with its lines and takes an exclusive lock on it.
    async fn lock_order(&mut self, order_id: OrderId) -> Result<Option<Order>>;

    /// Persists the order's current status and update timestamp.
    async fn update_order_status(&mut self, order: &Order) -> Result<()>;

    /// Inserts a notification.
    async fn insert_notification(&mut self, notification: &Notification) -> Result<()>;

    /// Makes every write of the transaction durable and releases its locks.
    async fn commit(self) -> Result<()>;

    /// Discards every write of the transaction and releases its locks.
    async fn rollback(self) -> Result<()>;
}
