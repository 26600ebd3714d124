//! Order aggregate root.

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::OrderError;

use super::{Money, OrderLine, OrderStatus};

/// Order aggregate root.
///
/// Owns its lines exclusively. The total amount is derived from the lines'
/// price snapshots and never recomputed from the live catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    lines: Vec<OrderLine>,
    total_amount: Money,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates an empty order shell in `pending` status.
    pub fn pending(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: OrderId::new(),
            user_id,
            lines: Vec::new(),
            total_amount: Money::zero(),
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds an order from persisted parts.
    ///
    /// The stored total is kept as-is; it was computed from the same lines
    /// when the order was placed.
    pub fn restore(
        id: OrderId,
        user_id: UserId,
        lines: Vec<OrderLine>,
        total_amount: Money,
        status: OrderStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            lines,
            total_amount,
            status,
            created_at,
            updated_at,
        }
    }

    /// Appends a line with a snapshot of the unit price and updates the total.
    ///
    /// Lines can only be added while the order is still `pending`.
    pub fn add_line(
        &mut self,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<&OrderLine, OrderError> {
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                product_id,
                quantity,
            });
        }
        if self.status != OrderStatus::Pending {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: OrderStatus::Pending,
            });
        }

        let total_amount = unit_price
            .checked_multiply(quantity)
            .and_then(|line_total| self.total_amount.checked_add(line_total))
            .ok_or(OrderError::AmountOverflow {
                product_id,
                quantity,
            })?;

        self.total_amount = total_amount;
        self.lines
            .push(OrderLine::new(self.id, product_id, quantity, unit_price));
        Ok(&self.lines[self.lines.len() - 1])
    }

    /// Moves the order to `next`, validating against the transition table.
    ///
    /// On failure the order is left untouched.
    pub fn transition_to(
        &mut self,
        next: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        self.status.validate_transition(next)?;
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Returns true if `user_id` owns this order.
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    /// Returns the total quantity across all lines.
    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
