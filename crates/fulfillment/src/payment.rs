//! Payment authorization trait and implementations.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use common::{OrderId, UserId};
use domain::Money;
use uuid::Uuid;

use crate::error::Result;

/// Outcome of a payment authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Funds were authorized.
    Approved { transaction_id: String },
    /// The payment was refused. The order stays pending.
    Declined { reason: String },
}

/// Authorizes payment for a freshly placed order.
///
/// Called inside the placement transaction. An `Err` aborts and rolls back
/// the whole placement; a [`PaymentOutcome::Declined`] does not.
#[async_trait]
pub trait PaymentAuthorizer: Send + Sync + 'static {
    async fn authorize(
        &self,
        order_id: OrderId,
        user_id: UserId,
        amount: Money,
    ) -> Result<PaymentOutcome>;
}

fn transaction_id() -> String {
    let id = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("TXN-{}", &id[..12])
}

/// Authorizer that approves every payment.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysApprove;

#[async_trait]
impl PaymentAuthorizer for AlwaysApprove {
    async fn authorize(
        &self,
        order_id: OrderId,
        _user_id: UserId,
        amount: Money,
    ) -> Result<PaymentOutcome> {
        tracing::debug!(order_id = %order_id, amount = %amount, "Payment approved");
        Ok(PaymentOutcome::Approved {
            transaction_id: transaction_id(),
        })
    }
}

/// In-memory authorizer for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentAuthorizer {
    decline: Arc<AtomicBool>,
    authorizations: Arc<AtomicUsize>,
}

impl InMemoryPaymentAuthorizer {
    /// Creates a new authorizer that approves by default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the authorizer to decline every payment.
    pub fn set_decline(&self, decline: bool) {
        self.decline.store(decline, Ordering::SeqCst);
    }

    /// Returns the number of authorization attempts seen.
    pub fn authorization_count(&self) -> usize {
        self.authorizations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentAuthorizer for InMemoryPaymentAuthorizer {
    async fn authorize(
        &self,
        _order_id: OrderId,
        _user_id: UserId,
        _amount: Money,
    ) -> Result<PaymentOutcome> {
        self.authorizations.fetch_add(1, Ordering::SeqCst);
        if self.decline.load(Ordering::SeqCst) {
            return Ok(PaymentOutcome::Declined {
                reason: "Payment declined by issuer".to_string(),
            });
        }
        Ok(PaymentOutcome::Approved {
            transaction_id: transaction_id(),
        })
    }
}
