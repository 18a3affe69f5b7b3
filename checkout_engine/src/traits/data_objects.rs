use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{NewTransaction, Order, OrderId, Transaction, TransactionStatus};

/// A request to take the settlement lease on an order.
#[derive(Debug, Clone)]
pub struct LeaseRequest {
    pub order_id: OrderId,
    /// The caller's user id. If the order is anonymous, it becomes the owner when the lease is granted.
    pub claimant: Option<String>,
    pub duration: Duration,
}

impl LeaseRequest {
    pub fn new(order_id: OrderId, claimant: Option<String>, duration: Duration) -> Self {
        Self { order_id, claimant, duration }
    }
}

/// Proof that the holder may charge the order until `expires_at`.
#[derive(Debug, Clone)]
pub struct SettlementLease {
    pub lease_id: String,
    pub expires_at: DateTime<Utc>,
    /// The order as it was when the lease was granted, including the bound owner.
    pub order: Order,
}

/// Everything needed to record a finished charge attempt.
#[derive(Debug, Clone)]
pub struct SettlementRecord {
    pub lease_id: String,
    /// The order with its freshly computed totals applied. Only the totals are written, and only if the charge
    /// succeeded.
    pub priced_order: Order,
    pub transaction: NewTransaction,
}

#[derive(Debug, Clone)]
pub enum SettlementOutcome {
    /// The charge succeeded and the order is now paid.
    Paid { order: Order, transaction: Transaction },
    /// The charge failed. The order is unchanged and can be paid again.
    Failed(Transaction),
    /// The charge succeeded, but the order had already been paid by someone else. The attempt was recorded as failed
    /// with code `duplicate_charge` and needs a refund.
    Duplicate(Transaction),
}

impl SettlementOutcome {
    pub fn transaction(&self) -> &Transaction {
        match self {
            SettlementOutcome::Paid { transaction, .. } => transaction,
            SettlementOutcome::Failed(tx) | SettlementOutcome::Duplicate(tx) => tx,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionQueryFilter {
    pub order_id: Option<OrderId>,
    pub user_id: Option<String>,
    pub status: Option<TransactionStatus>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TransactionQueryFilter {
    pub fn is_empty(&self) -> bool {
        self.order_id.is_none()
            && self.user_id.is_none()
            && self.status.is_none()
            && self.since.is_none()
            && self.until.is_none()
    }

    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_user_id<S: Into<String>>(mut self, user_id: S) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }
}
