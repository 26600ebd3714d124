//! User notifications.

use chrono::{DateTime, Utc};
use common::{NotificationId, UserId};
use serde::{Deserialize, Serialize};

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationCategory {
    Order,
    Inventory,
    Payment,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::Order => "order",
            NotificationCategory::Inventory => "inventory",
            NotificationCategory::Payment => "payment",
        }
    }
}

impl std::fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NotificationCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order" => Ok(NotificationCategory::Order),
            "inventory" => Ok(NotificationCategory::Inventory),
            "payment" => Ok(NotificationCategory::Payment),
            other => Err(format!("unknown notification category: {other}")),
        }
    }
}

/// A persisted message for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub category: NotificationCategory,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Creates a new unread notification.
    pub fn new(
        user_id: UserId,
        category: NotificationCategory,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            user_id,
            category,
            title: title.into(),
            message: message.into(),
            read: false,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_notification_is_unread() {
        let n = Notification::new(UserId::new(), NotificationCategory::Order, "t", "m");
        assert!(!n.read);
        assert_eq!(n.title, "t");
    }

    #[test]
    fn test_category_round_trip() {
        for category in [
            NotificationCategory::Order,
            NotificationCategory::Inventory,
            NotificationCategory::Payment,
        ] {
            assert_eq!(category.as_str().parse::<NotificationCategory>(), Ok(category));
        }
        assert!("email".parse::<NotificationCategory>().is_err());
    }
}
