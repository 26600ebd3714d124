//! Notification persistence and live delivery.

use common::UserId;
use domain::{Notification, NotificationCategory};
use hub::{Event, EventHub};
use store::{Store, StoreTx};

use crate::error::Result;

/// Persists user notifications and forwards their live events.
///
/// Each notification is written in its own short transaction, independent
/// of whatever operation produced it.
#[derive(Clone)]
pub struct NotificationDispatcher<S: Store> {
    store: S,
    hub: EventHub,
}

impl<S: Store + Clone> NotificationDispatcher<S> {
    pub fn new(store: S, hub: EventHub) -> Self {
        Self { store, hub }
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// Persists a notification, then pushes `event` to the user's live
    /// connections if one is given.
    ///
    /// Persistence failures are logged and returned; nothing is retried and
    /// no event is sent for a notification that was not stored.
    #[tracing::instrument(skip(self, title, message, event))]
    pub async fn create_notification(
        &self,
        user_id: UserId,
        category: NotificationCategory,
        title: impl Into<String> + Send,
        message: impl Into<String> + Send,
        event: Option<Event>,
    ) -> Result<Notification> {
        let notification = self
            .store_notification(user_id, category, title, message)
            .await?;
        if let Some(event) = event {
            self.deliver(user_id, &event).await;
        }
        Ok(notification)
    }

    /// Persists a notification without any live delivery.
    pub async fn store_notification(
        &self,
        user_id: UserId,
        category: NotificationCategory,
        title: impl Into<String> + Send,
        message: impl Into<String> + Send,
    ) -> Result<Notification> {
        let notification = Notification::new(user_id, category, title, message);

        if let Err(e) = self.persist(&notification).await {
            tracing::error!(user_id = %user_id, error = %e, "Failed to persist notification");
            metrics::counter!("notification_failures_total").increment(1);
            return Err(e);
        }
        metrics::counter!("notifications_persisted_total").increment(1);
        Ok(notification)
    }

    /// Pushes an event to the user's live connections.
    pub async fn deliver(&self, user_id: UserId, event: &Event) -> usize {
        let delivered = self.hub.send_to_user(user_id, event).await;
        tracing::debug!(
            user_id = %user_id,
            event_type = %event.event_type,
            delivered,
            "Notification event sent"
        );
        delivered
    }

    async fn persist(&self, notification: &Notification) -> Result<()> {
        let mut tx = self.store.begin().await?;
        tx.insert_notification(notification).await?;
        tx.commit().await?;
        Ok(())
    }
}
