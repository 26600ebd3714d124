//! Order engine: placement, cancellation, status changes and reads.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use common::{OrderId, ProductId, UserId};
use domain::{
    InventoryRecord, NotificationCategory, Order, OrderError, OrderStatus, Product,
};
use hub::{Event, EventHub, EventType};
use serde::{Deserialize, Serialize};
use store::{Store, StoreTx};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::{FulfillmentError, Result};
use crate::notifier::NotificationDispatcher;
use crate::payloads::{InventoryPayload, OrderPayload};
use crate::payment::{AlwaysApprove, PaymentAuthorizer, PaymentOutcome};

/// One requested line of a new order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl OrderItem {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// A notification queued for dispatch after commit.
struct Notice {
    user_id: UserId,
    category: NotificationCategory,
    title: String,
    message: String,
    event: Option<Event>,
}

impl Notice {
    fn new<T: Serialize>(
        user_id: UserId,
        category: NotificationCategory,
        title: impl Into<String>,
        message: impl Into<String>,
        event_type: EventType,
        payload: &T,
    ) -> Self {
        let event = match Event::new(event_type, payload) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::error!(user_id = %user_id, event_type = %event_type, error = %e, "Failed to build event");
                None
            }
        };
        Self {
            user_id,
            category,
            title: title.into(),
            message: message.into(),
            event,
        }
    }

    fn order(user_id: UserId, title: &str, message: String, event_type: EventType, order: &Order) -> Self {
        Self::new(
            user_id,
            NotificationCategory::Order,
            title,
            message,
            event_type,
            &OrderPayload::from(order),
        )
    }

    fn inventory(user_id: UserId, message: String, product: &Product, record: &InventoryRecord) -> Self {
        Self::new(
            user_id,
            NotificationCategory::Inventory,
            "Inventory Update",
            message,
            EventType::InventoryUpdated,
            &InventoryPayload::new(product, record),
        )
    }
}

/// Result of a committed placement.
struct Placement {
    order: Order,
    inventory: Vec<(Product, InventoryRecord)>,
}

struct EngineInner<S: Store, P> {
    store: S,
    payments: P,
    dispatcher: NotificationDispatcher<S>,
    config: EngineConfig,
}

/// Runs order operations against a [`Store`].
///
/// Every order-affecting operation runs in one storage transaction and takes
/// exclusive row locks on the inventory records and orders it reads.
/// Notifications are sent after commit from detached tasks and never affect
/// the operation's result.
pub struct OrderEngine<S: Store, P = AlwaysApprove> {
    inner: Arc<EngineInner<S, P>>,
}

impl<S: Store, P> Clone for OrderEngine<S, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Store + Clone> OrderEngine<S, AlwaysApprove> {
    /// Creates an engine that approves every payment.
    pub fn new(store: S, hub: EventHub, config: EngineConfig) -> Self {
        Self::with_payments(store, hub, AlwaysApprove, config)
    }
}

impl<S, P> OrderEngine<S, P>
where
    S: Store + Clone,
    P: PaymentAuthorizer,
{
    pub fn with_payments(store: S, hub: EventHub, payments: P, config: EngineConfig) -> Self {
        let dispatcher = NotificationDispatcher::new(store.clone(), hub);
        Self {
            inner: Arc::new(EngineInner {
                store,
                payments,
                dispatcher,
                config,
            }),
        }
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn hub(&self) -> &EventHub {
        self.inner.dispatcher.hub()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Places an order for `user_id`.
    ///
    /// See [`OrderEngine::create_order_with_cancel`].
    pub async fn create_order(&self, user_id: UserId, items: Vec<OrderItem>) -> Result<Order> {
        self.create_order_with_cancel(user_id, items, &CancellationToken::new())
            .await
    }

    /// Places an order, giving up waiting when `cancel` fires or the
    /// configured timeout elapses.
    ///
    /// The placement runs in its own task. A caller that stops waiting gets
    /// [`FulfillmentError::Cancelled`] or [`FulfillmentError::Timeout`]
    /// while the placement still runs to commit or rollback, so the outcome
    /// is unknown to that caller.
    #[tracing::instrument(skip(self, items, cancel), fields(lines = items.len()))]
    pub async fn create_order_with_cancel(
        &self,
        user_id: UserId,
        items: Vec<OrderItem>,
        cancel: &CancellationToken,
    ) -> Result<Order> {
        validate_items(&items)?;

        let (done_tx, done_rx) = oneshot::channel();
        let engine = self.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let result = engine.place_order(user_id, &items).await;
            metrics::histogram!("order_create_duration_seconds")
                .record(started.elapsed().as_secs_f64());

            let result = match result {
                Ok(placement) => {
                    metrics::counter!("orders_created_total").increment(1);
                    engine.spawn_notices(created_notices(&placement));
                    Ok(placement.order)
                }
                Err(e) => {
                    metrics::counter!("order_create_failures_total", "reason" => e.code())
                        .increment(1);
                    tracing::info!(user_id = %user_id, error = %e, "Order placement failed");
                    Err(e)
                }
            };
            // The receiver is gone when the caller stopped waiting.
            let _ = done_tx.send(result);
        });

        let completion = async {
            done_rx.await.unwrap_or_else(|_| {
                Err(FulfillmentError::Internal(
                    "order placement task ended without a result".to_string(),
                ))
            })
        };
        let bounded = async {
            match self.inner.config.create_timeout {
                Some(limit) => tokio::time::timeout(limit, completion)
                    .await
                    .unwrap_or(Err(FulfillmentError::Timeout(limit))),
                None => completion.await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!(user_id = %user_id, "Caller cancelled while order placement was in flight");
                Err(FulfillmentError::Cancelled)
            }
            result = bounded => {
                if let Err(FulfillmentError::Timeout(limit)) = &result {
                    tracing::warn!(user_id = %user_id, timeout = ?limit, "Order placement wait timed out");
                }
                result
            }
        }
    }

    async fn place_order(&self, user_id: UserId, items: &[OrderItem]) -> Result<Placement> {
        let mut tx = self.inner.store.begin().await?;
        let mut order = Order::pending(user_id, Utc::now());
        let mut inventory: Vec<(Product, InventoryRecord)> = Vec::with_capacity(items.len());

        // Locks are taken in request order.
        for item in items {
            let product = tx
                .get_product(item.product_id)
                .await?
                .ok_or(FulfillmentError::ProductNotFound(item.product_id))?;

            let mut record = tx
                .lock_inventory(item.product_id)
                .await?
                .unwrap_or_else(|| InventoryRecord::empty(item.product_id));
            record.reserve(item.quantity)?;
            tx.save_inventory(&record).await?;

            order.add_line(product.id, item.quantity, product.price)?;

            match inventory.iter_mut().find(|(p, _)| p.id == product.id) {
                Some(entry) => entry.1 = record,
                None => inventory.push((product, record)),
            }
        }

        tx.insert_order(&order).await?;

        match self
            .inner
            .payments
            .authorize(order.id(), user_id, order.total_amount())
            .await?
        {
            PaymentOutcome::Approved { transaction_id } => {
                order.transition_to(OrderStatus::Processing, Utc::now())?;
                tx.update_order_status(&order).await?;
                tracing::debug!(order_id = %order.id(), transaction_id = %transaction_id, "Payment authorized");
            }
            PaymentOutcome::Declined { reason } => {
                tracing::warn!(order_id = %order.id(), reason = %reason, "Payment declined, order left pending");
            }
        }

        tx.commit().await?;

        tracing::info!(
            order_id = %order.id(),
            user_id = %user_id,
            total_cents = order.total_amount().cents(),
            status = %order.status(),
            "Order placed"
        );

        Ok(Placement { order, inventory })
    }

    /// Cancels an order owned by `user_id`.
    ///
    /// Reserved stock of every line is released. Available stock is left
    /// unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId, user_id: UserId) -> Result<Order> {
        let mut tx = self.inner.store.begin().await?;

        let mut order = tx
            .lock_order(order_id)
            .await?
            .ok_or(FulfillmentError::OrderNotFound(order_id))?;
        if !order.is_owned_by(user_id) {
            return Err(FulfillmentError::Forbidden(order_id));
        }

        order.transition_to(OrderStatus::Cancelled, Utc::now())?;
        tx.update_order_status(&order).await?;

        let mut inventory: Vec<(Product, InventoryRecord)> = Vec::new();
        for line in order.lines() {
            let mut record = tx
                .lock_inventory(line.product_id)
                .await?
                .unwrap_or_else(|| InventoryRecord::empty(line.product_id));
            record.release(line.quantity)?;
            tx.save_inventory(&record).await?;

            let product = tx
                .get_product(line.product_id)
                .await?
                .unwrap_or_else(|| Product::new(line.product_id, line.product_id.to_string(), line.unit_price));
            match inventory.iter_mut().find(|(p, _)| p.id == product.id) {
                Some(entry) => entry.1 = record,
                None => inventory.push((product, record)),
            }
        }

        tx.commit().await?;

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(order_id = %order_id, user_id = %user_id, "Order cancelled");

        let mut notices = vec![Notice::order(
            user_id,
            "Order Cancelled",
            format!("Your order #{} has been cancelled.", order.id()),
            EventType::OrderCancelled,
            &order,
        )];
        notices.extend(inventory.iter().map(|(product, record)| {
            Notice::inventory(
                user_id,
                format!(
                    "Current inventory for {}: {} units",
                    product.name, record.available
                ),
                product,
                record,
            )
        }));
        self.spawn_notices(notices);

        Ok(order)
    }

    /// Moves an order to `status`. Ownership and roles are checked by the
    /// caller.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_status(&self, order_id: OrderId, status: OrderStatus) -> Result<Order> {
        let mut tx = self.inner.store.begin().await?;

        let mut order = tx
            .lock_order(order_id)
            .await?
            .ok_or(FulfillmentError::OrderNotFound(order_id))?;
        let from = order.status();
        order.transition_to(status, Utc::now())?;
        tx.update_order_status(&order).await?;
        tx.commit().await?;

        metrics::counter!("order_status_updates_total", "status" => status.as_str()).increment(1);
        tracing::info!(order_id = %order_id, from = %from, to = %status, "Order status updated");

        self.spawn_notices(vec![Notice::order(
            order.user_id(),
            "Order Status Updated",
            format!("Your order #{} is now {}.", order.id(), status),
            EventType::OrderStatusUpdated,
            &order,
        )]);

        Ok(order)
    }

    /// Returns the status of an order owned by `user_id`.
    #[tracing::instrument(skip(self))]
    pub async fn get_order_status(&self, order_id: OrderId, user_id: UserId) -> Result<OrderStatus> {
        Ok(self.get_order_for_user(order_id, user_id).await?.status())
    }

    /// Loads an order owned by `user_id`.
    #[tracing::instrument(skip(self))]
    pub async fn get_order_for_user(&self, order_id: OrderId, user_id: UserId) -> Result<Order> {
        let order = self.get_order(order_id).await?;
        if !order.is_owned_by(user_id) {
            return Err(FulfillmentError::Forbidden(order_id));
        }
        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.inner
            .store
            .get_order(order_id)
            .await?
            .ok_or(FulfillmentError::OrderNotFound(order_id))
    }

    /// Lists a user's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        Ok(self.inner.store.list_orders_by_user(user_id).await?)
    }

    /// Persists notices in order on one task and hands their events to a
    /// second task, so a slow client delays delivery but never persistence.
    fn spawn_notices(&self, notices: Vec<Notice>) {
        if notices.is_empty() {
            return;
        }
        let dispatcher = self.inner.dispatcher.clone();
        let courier = dispatcher.clone();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<(UserId, Event)>();

        tokio::spawn(async move {
            while let Some((user_id, event)) = events_rx.recv().await {
                courier.deliver(user_id, &event).await;
            }
        });

        tokio::spawn(async move {
            for notice in notices {
                // Failures are logged by the dispatcher.
                let stored = dispatcher
                    .store_notification(
                        notice.user_id,
                        notice.category,
                        notice.title,
                        notice.message,
                    )
                    .await;
                if let (Ok(_), Some(event)) = (stored, notice.event) {
                    let _ = events_tx.send((notice.user_id, event));
                }
            }
        });
    }
}

fn validate_items(items: &[OrderItem]) -> Result<()> {
    if items.is_empty() {
        return Err(OrderError::NoLines.into());
    }
    if let Some(item) = items.iter().find(|item| item.quantity == 0) {
        return Err(OrderError::InvalidQuantity {
            product_id: item.product_id,
            quantity: item.quantity,
        }
        .into());
    }
    Ok(())
}

fn created_notices(placement: &Placement) -> Vec<Notice> {
    let order = &placement.order;
    let user_id = order.user_id();

    let mut notices = vec![Notice::order(
        user_id,
        "Order Placed Successfully",
        format!(
            "Your order #{} has been placed and is being processed.",
            order.id()
        ),
        EventType::OrderCreated,
        order,
    )];
    notices.extend(placement.inventory.iter().map(|(product, record)| {
        Notice::inventory(
            user_id,
            format!(
                "Updated inventory for {}: {} units available",
                product.name, record.available
            ),
            product,
            record,
        )
    }));
    notices
}
