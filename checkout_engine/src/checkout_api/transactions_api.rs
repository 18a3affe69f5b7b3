use std::fmt::Debug;

use log::*;

use crate::{
    checkout_api::{
        auth::{is_admin, is_owner, Claims},
        errors::PaymentError,
    },
    db_types::{OrderId, Transaction},
    traits::{OrderManagement, TransactionManagement, TransactionQueryFilter},
};

/// Read access to the transaction journal, gated by ownership.
///
/// Every method takes the caller as `Option<&Claims>`; `None` is an unauthenticated caller and is always refused.
pub struct TransactionsApi<B> {
    db: B,
}

impl<B> Debug for TransactionsApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TransactionsApi")
    }
}

impl<B> TransactionsApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> TransactionsApi<B>
where B: OrderManagement + TransactionManagement
{
    /// All transactions paid by `user_id`. Only that user or an admin may look.
    pub async fn transactions_for_user(
        &self,
        caller: Option<&Claims>,
        user_id: &str,
    ) -> Result<Vec<Transaction>, PaymentError> {
        let caller = authenticated(caller)?;
        if !is_owner(caller, user_id) && !is_admin(caller) {
            return Err(refuse(caller));
        }
        let filter = TransactionQueryFilter::default().with_user_id(user_id);
        let transactions = self.db.fetch_transactions(filter).await?;
        Ok(transactions)
    }

    /// All attempts to pay for an order, oldest first. Anonymous orders are only visible to admins. Bound orders are
    /// visible to their owner and admins.
    pub async fn transactions_for_order(
        &self,
        caller: Option<&Claims>,
        order_id: &OrderId,
    ) -> Result<Vec<Transaction>, PaymentError> {
        let caller = authenticated(caller)?;
        let order =
            self.db.fetch_order(order_id).await?.ok_or_else(|| PaymentError::NotFound(format!("Order {order_id}")))?;
        let allowed = match order.user_id.as_deref() {
            Some(owner) => is_owner(caller, owner) || is_admin(caller),
            None => is_admin(caller),
        };
        if !allowed {
            return Err(refuse(caller));
        }
        let filter = TransactionQueryFilter::default().with_order_id(order_id.clone());
        let transactions = self.db.fetch_transactions(filter).await?;
        Ok(transactions)
    }

    /// Admin only.
    pub async fn transaction_by_id(&self, caller: Option<&Claims>, id: &str) -> Result<Transaction, PaymentError> {
        require_admin(caller)?;
        self.db.fetch_transaction(id).await?.ok_or_else(|| PaymentError::NotFound(format!("Transaction {id}")))
    }

    /// Admin only.
    pub async fn search_transactions(
        &self,
        caller: Option<&Claims>,
        filter: TransactionQueryFilter,
    ) -> Result<Vec<Transaction>, PaymentError> {
        require_admin(caller)?;
        let transactions = self.db.fetch_transactions(filter).await?;
        Ok(transactions)
    }
}

fn authenticated(caller: Option<&Claims>) -> Result<&Claims, PaymentError> {
    caller.filter(|c| !c.id.is_empty()).ok_or(PaymentError::Unauthorized)
}

fn require_admin(caller: Option<&Claims>) -> Result<(), PaymentError> {
    let caller = authenticated(caller)?;
    if is_admin(caller) {
        Ok(())
    } else {
        Err(refuse(caller))
    }
}

fn refuse(caller: &Claims) -> PaymentError {
    warn!("💳️ {} was refused access to transaction records", caller.id);
    PaymentError::Unauthorized
}
