use serde::{Deserialize, Serialize};

use crate::HubError;

/// The kind of a live event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    OrderCreated,
    OrderCancelled,
    OrderStatusUpdated,
    InventoryUpdated,
    Notification,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::OrderCreated => "order_created",
            EventType::OrderCancelled => "order_cancelled",
            EventType::OrderStatusUpdated => "order_status_updated",
            EventType::InventoryUpdated => "inventory_updated",
            EventType::Notification => "notification",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An ephemeral message pushed to live connections.
///
/// Wire format:
/// ```json
/// { "type": "order_created", "payload": { ... } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub payload: serde_json::Value,
}

impl Event {
    /// Builds an event from any serializable payload.
    pub fn new<T: Serialize>(event_type: EventType, payload: &T) -> Result<Self, HubError> {
        Ok(Self {
            event_type,
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Serializes the event into a text frame.
    pub fn to_frame(&self) -> Result<String, HubError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_uses_type_and_payload_keys() {
        let event = Event::new(
            EventType::InventoryUpdated,
            &serde_json::json!({ "available": 2 }),
        )
        .unwrap();

        let frame: serde_json::Value = serde_json::from_str(&event.to_frame().unwrap()).unwrap();
        assert_eq!(frame["type"], "inventory_updated");
        assert_eq!(frame["payload"]["available"], 2);
    }
}
