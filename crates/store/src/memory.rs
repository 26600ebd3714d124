use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};

use async_trait::async_trait;
use common::{OrderId, ProductId, UserId};
use domain::{InventoryRecord, Notification, Order, Product};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    Result, StoreError,
    store::{Store, StoreTx},
};

#[derive(Debug, Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    inventory: HashMap<ProductId, InventoryRecord>,
    orders: HashMap<OrderId, Order>,
    notifications: Vec<Notification>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Inventory(ProductId),
    Order(OrderId),
}

/// In-memory store implementation.
///
/// Provides the same transactional guarantees as the PostgreSQL store:
/// writes are buffered per transaction and applied atomically on commit,
/// and locked reads hold a per-row exclusive lock until the transaction ends.
/// Row lock entries exist only while some transaction holds or awaits them.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    row_locks: Arc<std::sync::Mutex<HashMap<RowKey, Arc<Mutex<()>>>>>,
    fail_notifications: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a catalog product.
    pub async fn insert_product(&self, product: Product) {
        self.tables
            .write()
            .await
            .products
            .insert(product.id, product);
    }

    /// Sets the inventory record of a product.
    pub async fn set_inventory(&self, record: InventoryRecord) {
        self.tables
            .write()
            .await
            .inventory
            .insert(record.product_id, record);
    }

    /// Makes every notification insert fail until switched off again.
    pub fn set_fail_notifications(&self, fail: bool) {
        self.fail_notifications.store(fail, Ordering::SeqCst);
    }

    /// Returns the total number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Returns the total number of stored notifications.
    pub async fn notification_count(&self) -> usize {
        self.tables.read().await.notifications.len()
    }

    async fn acquire(&self, key: RowKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.row_locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(key).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Drops lock entries that no transaction holds or waits on.
    fn prune_row_locks(&self) {
        self.row_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<InMemoryTx> {
        Ok(InMemoryTx {
            store: self.clone(),
            guards: HashMap::new(),
            inventory: HashMap::new(),
            orders: HashMap::new(),
            notifications: Vec::new(),
        })
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&order_id).cloned())
    }

    async fn list_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<_> = tables
            .orders
            .values()
            .filter(|o| o.user_id() == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(orders)
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        Ok(self.tables.read().await.products.get(&product_id).cloned())
    }

    async fn get_inventory(&self, product_id: ProductId) -> Result<Option<InventoryRecord>> {
        Ok(self.tables.read().await.inventory.get(&product_id).copied())
    }

    async fn list_notifications(&self, user_id: UserId) -> Result<Vec<Notification>> {
        let tables = self.tables.read().await;
        let mut notifications: Vec<_> = tables
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }
}

/// Transaction over an [`InMemoryStore`].
///
/// Writes live in per-transaction overlays until commit.
pub struct InMemoryTx {
    store: InMemoryStore,
    guards: HashMap<RowKey, OwnedMutexGuard<()>>,
    inventory: HashMap<ProductId, InventoryRecord>,
    orders: HashMap<OrderId, Order>,
    notifications: Vec<Notification>,
}

impl InMemoryTx {
    async fn lock(&mut self, key: RowKey) {
        if !self.guards.contains_key(&key) {
            let guard = self.store.acquire(key).await;
            self.guards.insert(key, guard);
        }
    }
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn get_product(&mut self, product_id: ProductId) -> Result<Option<Product>> {
        self.store.get_product(product_id).await
    }

    async fn lock_inventory(&mut self, product_id: ProductId) -> Result<Option<InventoryRecord>> {
        self.lock(RowKey::Inventory(product_id)).await;
        if let Some(record) = self.inventory.get(&product_id) {
            return Ok(Some(*record));
        }
        self.store.get_inventory(product_id).await
    }

    async fn save_inventory(&mut self, record: &InventoryRecord) -> Result<()> {
        self.lock(RowKey::Inventory(record.product_id)).await;
        self.inventory.insert(record.product_id, *record);
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        let exists = self.orders.contains_key(&order.id())
            || self.store.get_order(order.id()).await?.is_some();
        if exists {
            return Err(StoreError::InvalidData(format!(
                "order {} already exists",
                order.id()
            )));
        }
        self.orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn lock_order(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        self.lock(RowKey::Order(order_id)).await;
        if let Some(order) = self.orders.get(&order_id) {
            return Ok(Some(order.clone()));
        }
        self.store.get_order(order_id).await
    }

    async fn update_order_status(&mut self, order: &Order) -> Result<()> {
        let current = match self.orders.get(&order.id()) {
            Some(order) => Some(order.clone()),
            None => self.store.get_order(order.id()).await?,
        };
        let Some(current) = current else {
            return Err(StoreError::InvalidData(format!(
                "order {} does not exist",
                order.id()
            )));
        };
        let updated = Order::restore(
            current.id(),
            current.user_id(),
            current.lines().to_vec(),
            current.total_amount(),
            order.status(),
            current.created_at(),
            order.updated_at(),
        );
        self.orders.insert(order.id(), updated);
        Ok(())
    }

    async fn insert_notification(&mut self, notification: &Notification) -> Result<()> {
        if self.store.fail_notifications.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "notification writes are disabled".to_string(),
            ));
        }
        self.notifications.push(notification.clone());
        Ok(())
    }

    async fn commit(mut self) -> Result<()> {
        {
            let mut tables = self.store.tables.write().await;
            tables.inventory.extend(self.inventory.drain());
            tables.orders.extend(self.orders.drain());
            tables.notifications.append(&mut self.notifications);
        }
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

impl Drop for InMemoryTx {
    fn drop(&mut self) {
        if self.guards.is_empty() {
            return;
        }
        self.guards.clear();
        self.store.prune_row_locks();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use domain::{Money, NotificationCategory, OrderStatus};

    use super::*;

    async fn seeded_store(available: u32) -> (InMemoryStore, ProductId) {
        let store = InMemoryStore::new();
        let product_id = ProductId::new();
        store
            .insert_product(Product::new(product_id, "Widget", Money::from_cents(1000)))
            .await;
        store
            .set_inventory(InventoryRecord::new(product_id, available))
            .await;
        (store, product_id)
    }

    #[tokio::test]
    async fn writes_are_invisible_until_commit() {
        let (store, product_id) = seeded_store(5).await;

        let mut tx = store.begin().await.unwrap();
        let mut record = tx.lock_inventory(product_id).await.unwrap().unwrap();
        record.reserve(2).unwrap();
        tx.save_inventory(&record).await.unwrap();

        let outside = store.get_inventory(product_id).await.unwrap().unwrap();
        assert_eq!(outside.available, 5);

        tx.commit().await.unwrap();

        let after = store.get_inventory(product_id).await.unwrap().unwrap();
        assert_eq!(after.available, 3);
        assert_eq!(after.reserved, 2);
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let (store, product_id) = seeded_store(5).await;

        let mut tx = store.begin().await.unwrap();
        let mut order = Order::pending(UserId::new(), Utc::now());
        order
            .add_line(product_id, 1, Money::from_cents(1000))
            .unwrap();
        tx.insert_order(&order).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn dropped_transaction_releases_locks() {
        let (store, product_id) = seeded_store(5).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.lock_inventory(product_id).await.unwrap();
        }

        let mut tx = store.begin().await.unwrap();
        let locked = tokio::time::timeout(Duration::from_secs(1), tx.lock_inventory(product_id))
            .await
            .expect("lock should be free after drop");
        assert!(locked.unwrap().is_some());
    }

    #[tokio::test]
    async fn relocking_same_row_does_not_block() {
        let (store, product_id) = seeded_store(5).await;

        let mut tx = store.begin().await.unwrap();
        tx.lock_inventory(product_id).await.unwrap();
        let second = tokio::time::timeout(Duration::from_secs(1), tx.lock_inventory(product_id))
            .await
            .expect("re-lock within one transaction must not deadlock");
        assert!(second.unwrap().is_some());
    }

    #[tokio::test]
    async fn locked_row_blocks_other_transactions() {
        let (store, product_id) = seeded_store(5).await;

        let mut first = store.begin().await.unwrap();
        first.lock_inventory(product_id).await.unwrap();

        let mut second = store.begin().await.unwrap();
        let blocked =
            tokio::time::timeout(Duration::from_millis(50), second.lock_inventory(product_id))
                .await;
        assert!(blocked.is_err());

        first.commit().await.unwrap();
        let unblocked =
            tokio::time::timeout(Duration::from_secs(1), second.lock_inventory(product_id)).await;
        assert!(unblocked.is_ok());
    }

    fn row_lock_entries(store: &InMemoryStore) -> usize {
        store.row_locks.lock().unwrap().len()
    }

    #[tokio::test]
    async fn row_locks_are_released_when_transactions_end() {
        let store = InMemoryStore::new();

        for _ in 0..100 {
            let mut tx = store.begin().await.unwrap();
            tx.lock_inventory(ProductId::new()).await.unwrap();
            tx.lock_order(OrderId::new()).await.unwrap();
            tx.commit().await.unwrap();
        }
        assert_eq!(row_lock_entries(&store), 0);

        let mut tx = store.begin().await.unwrap();
        tx.lock_inventory(ProductId::new()).await.unwrap();
        assert_eq!(row_lock_entries(&store), 1);
        tx.rollback().await.unwrap();
        assert_eq!(row_lock_entries(&store), 0);

        {
            let mut tx = store.begin().await.unwrap();
            tx.lock_order(OrderId::new()).await.unwrap();
        }
        assert_eq!(row_lock_entries(&store), 0);
    }

    #[tokio::test]
    async fn waiting_transaction_keeps_row_lock_entry() {
        let (store, product_id) = seeded_store(5).await;

        let mut first = store.begin().await.unwrap();
        first.lock_inventory(product_id).await.unwrap();

        let waiter_store = store.clone();
        let waiter = tokio::spawn(async move {
            let mut second = waiter_store.begin().await.unwrap();
            let record = second.lock_inventory(product_id).await.unwrap();
            second.commit().await.unwrap();
            record
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        first.commit().await.unwrap();
        let record = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should get the row after commit")
            .unwrap();

        assert!(record.is_some());
        assert_eq!(row_lock_entries(&store), 0);
    }

    #[tokio::test]
    async fn status_update_keeps_lines_and_total() {
        let (store, product_id) = seeded_store(5).await;
        let mut order = Order::pending(UserId::new(), Utc::now());
        order
            .add_line(product_id, 2, Money::from_cents(1000))
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&order).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let mut locked = tx.lock_order(order.id()).await.unwrap().unwrap();
        locked
            .transition_to(OrderStatus::Processing, Utc::now())
            .unwrap();
        tx.update_order_status(&locked).await.unwrap();
        tx.commit().await.unwrap();

        let stored = store.get_order(order.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), OrderStatus::Processing);
        assert_eq!(stored.lines().len(), 1);
        assert_eq!(stored.total_amount().cents(), 2000);
    }

    #[tokio::test]
    async fn list_orders_is_newest_first_and_empty_for_unknown_user() {
        let store = InMemoryStore::new();
        let user_id = UserId::new();
        let older = Order::pending(user_id, Utc::now() - chrono::Duration::minutes(1));
        let newer = Order::pending(user_id, Utc::now());

        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&older).await.unwrap();
        tx.insert_order(&newer).await.unwrap();
        tx.commit().await.unwrap();

        let orders = store.list_orders_by_user(user_id).await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].id(), newer.id());

        let none = store.list_orders_by_user(UserId::new()).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn notification_failure_injection() {
        let store = InMemoryStore::new();
        store.set_fail_notifications(true);

        let mut tx = store.begin().await.unwrap();
        let notification =
            Notification::new(UserId::new(), NotificationCategory::Order, "title", "body");
        let result = tx.insert_notification(&notification).await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
