//! `SqliteDatabase` is the SQLite ledger backend.
//!
//! It implements every trait in [`crate::traits`] that a store needs to implement, by composing the low-level
//! functions in [`super::db`] inside pool transactions.
use std::fmt::Debug;

use chrono::Utc;
use log::*;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::db::{addresses, db_url, line_items, max_connections, new_pool, orders, transactions};
use crate::{
    db_types::{FullOrder, NewOrder, NewTransaction, Order, OrderId, Price, Transaction},
    traits::{
        LeaseRequest,
        LedgerError,
        OrderManagement,
        SettlementDatabase,
        SettlementLease,
        SettlementOutcome,
        SettlementRecord,
        TransactionManagement,
        TransactionQueryFilter,
    },
};

pub const DUPLICATE_CHARGE_CODE: &str = "duplicate_charge";

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder, price: Price) -> Result<Order, LedgerError> {
        let id = OrderId::random();
        let total = price.order_total(order.shipping).map_err(|e| LedgerError::InvalidOrder(e.to_string()))?;
        let mut tx = self.pool.begin().await?;
        if let Some(address) = &order.shipping_address {
            addresses::insert_address(address, &mut tx).await?;
        }
        if let Some(address) = &order.billing_address {
            let same_as_shipping = order.shipping_address.as_ref().is_some_and(|s| s.id == address.id);
            if !same_as_shipping {
                addresses::insert_address(address, &mut tx).await?;
            }
        }
        let inserted = orders::insert_order(&id, &order, &price, total, &mut tx).await?;
        line_items::insert_line_items(&id, &order.line_items, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {id} has been saved with {} line items. Total: {}", order.line_items.len(), inserted.total);
        Ok(inserted)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_full_order(&self, order_id: &OrderId) -> Result<Option<FullOrder>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let order = match orders::fetch_order(order_id, &mut conn).await? {
            Some(o) => o,
            None => return Ok(None),
        };
        let line_items = line_items::fetch_line_items(order_id, &mut conn).await?;
        let shipping_address = match &order.shipping_address_id {
            Some(id) => addresses::fetch_address(id, &mut conn).await?,
            None => None,
        };
        let billing_address = match &order.billing_address_id {
            Some(id) => addresses::fetch_address(id, &mut conn).await?,
            None => None,
        };
        let transactions = transactions::fetch_transactions_for_order(order_id, &mut conn).await?;
        Ok(Some(FullOrder { order, line_items, shipping_address, billing_address, transactions }))
    }

    async fn save_order(&self, order: &Order) -> Result<Order, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let existing =
            orders::fetch_order(&order.id, &mut tx).await?.ok_or_else(|| LedgerError::OrderNotFound(order.id.clone()))?;
        if let Err(e) = check_order_edit(&existing, order) {
            warn!("🗃️ Refused to save order {}: {e}", order.id);
            return Err(e);
        }
        let saved = orders::update_order(order, &mut tx).await?.ok_or_else(|| {
            warn!("🗃️ Refused to save order {}: it belongs to someone else", order.id);
            LedgerError::OwnershipConflict(order.id.clone())
        })?;
        tx.commit().await?;
        trace!("🗃️ Order {} saved", saved.id);
        Ok(saved)
    }

    async fn mark_order_shipped(&self, order_id: &OrderId) -> Result<Order, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let shipped = match orders::mark_shipped(order_id, &mut tx).await? {
            Some(o) => o,
            None => {
                let e = match orders::fetch_order(order_id, &mut tx).await? {
                    None => LedgerError::OrderNotFound(order_id.clone()),
                    Some(o) if !o.is_paid() => LedgerError::OrderNotPaid(order_id.clone()),
                    Some(_) => LedgerError::OrderAlreadyShipped(order_id.clone()),
                };
                return Err(e);
            },
        };
        tx.commit().await?;
        info!("🗃️ Order {order_id} has shipped");
        Ok(shipped)
    }

    async fn soft_delete_order(&self, order_id: &OrderId) -> Result<Order, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let deleted = orders::soft_delete(order_id, &mut conn)
            .await?
            .ok_or_else(|| LedgerError::OrderNotFound(order_id.clone()))?;
        info!("🗃️ Order {order_id} has been deleted");
        Ok(deleted)
    }
}

/// Checks that `edited` only differs from `existing` in the fields a shopper may change.
///
/// States only move through settlement and shipping, and the priced fields are only rewritten when an order is paid.
fn check_order_edit(existing: &Order, edited: &Order) -> Result<(), LedgerError> {
    let forbidden = |reason: &str| LedgerError::ModificationForbidden(existing.id.clone(), reason.into());
    if existing.payment_state != edited.payment_state ||
        existing.fulfillment_state != edited.fulfillment_state ||
        existing.state != edited.state
    {
        return Err(forbidden("payment and fulfilment state only change through settlement and shipping"));
    }
    let same_price = existing.subtotal == edited.subtotal &&
        existing.taxes == edited.taxes &&
        existing.shipping == edited.shipping &&
        existing.discount == edited.discount &&
        existing.total == edited.total;
    if !same_price {
        return Err(forbidden("the price of an order only changes when it is paid"));
    }
    if existing.currency != edited.currency || existing.session_id != edited.session_id {
        return Err(forbidden("currency and session cannot change"));
    }
    match &existing.user_id {
        Some(owner) if edited.user_id.as_ref() != Some(owner) => {
            Err(LedgerError::OwnershipConflict(existing.id.clone()))
        },
        _ => Ok(()),
    }
}

impl TransactionManagement for SqliteDatabase {
    async fn append_transaction(&self, transaction: NewTransaction) -> Result<Transaction, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let order_id = transaction.order_id.clone();
        if orders::fetch_order(&order_id, &mut conn).await?.is_none() {
            return Err(LedgerError::OrderNotFound(order_id));
        }
        let tx = transactions::insert_transaction(&transaction, &mut conn)
            .await
            .map_err(|e| unique_violation(e, &order_id))?;
        debug!("🗃️ Transaction {} appended to order {order_id} with status {}", tx.id, tx.status);
        Ok(tx)
    }

    async fn fetch_transaction(&self, id: &str) -> Result<Option<Transaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let tx = transactions::fetch_transaction(id, &mut conn).await?;
        Ok(tx)
    }

    async fn fetch_transactions(&self, filter: TransactionQueryFilter) -> Result<Vec<Transaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let txs = transactions::search_transactions(filter, &mut conn).await?;
        Ok(txs)
    }
}

impl SettlementDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn acquire_settlement_lease(&self, request: LeaseRequest) -> Result<SettlementLease, LedgerError> {
        let LeaseRequest { order_id, claimant, duration } = request;
        let lease_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let duration = chrono::Duration::from_std(duration)
            .map_err(|e| LedgerError::ConversionError(format!("Invalid lease duration. {e}")))?;
        let expires_at = now + duration;
        let mut conn = self.pool.acquire().await?;
        let granted =
            orders::acquire_lease(&order_id, &lease_id, claimant.as_deref(), now, expires_at, &mut conn).await?;
        if let Some(order) = granted {
            debug!("🗃️ Settlement lease {lease_id} on order {order_id} held until {expires_at}");
            return Ok(SettlementLease { lease_id, expires_at, order });
        }
        // Work out why the lease was refused. Nothing here is acted on, so a stale read is harmless.
        let e = match orders::fetch_order(&order_id, &mut conn).await? {
            None => LedgerError::OrderNotFound(order_id),
            Some(o) if o.is_paid() => LedgerError::OrderAlreadyPaid(order_id),
            Some(o) if o.user_id.is_some() && o.user_id != claimant => LedgerError::OwnershipConflict(order_id),
            Some(_) => {
                if !orders::has_live_lease(&order_id, now, &mut conn).await? {
                    debug!("🗃️ The lease on order {order_id} was released while we were looking. A retry may succeed.");
                }
                LedgerError::SettlementInProgress(order_id)
            },
        };
        debug!("🗃️ Settlement lease refused: {e}");
        Err(e)
    }

    async fn record_settlement(&self, record: SettlementRecord) -> Result<SettlementOutcome, LedgerError> {
        let SettlementRecord { lease_id, priced_order, transaction } = record;
        let order_id = priced_order.id.clone();
        let mut tx = self.pool.begin().await?;
        let outcome = if transaction.is_successful() {
            let paid = orders::mark_paid(
                &order_id,
                priced_order.subtotal,
                priced_order.taxes,
                priced_order.discount,
                priced_order.total,
                &mut tx,
            )
            .await?;
            match paid {
                Some(order) => {
                    let transaction = transactions::insert_transaction(&transaction, &mut tx)
                        .await
                        .map_err(|e| unique_violation(e, &order_id))?;
                    SettlementOutcome::Paid { order, transaction }
                },
                None => {
                    let processor_id = transaction.processor_id.clone().unwrap_or_default();
                    error!(
                        "🗃️ Order {order_id} was paid while charge {processor_id} was in flight. The charge is being \
                         recorded as a duplicate and must be refunded."
                    );
                    let duplicate = transaction.into_failure(
                        DUPLICATE_CHARGE_CODE,
                        "The order had already been paid when this charge completed. A refund is required.",
                    );
                    orders::release_lease(&order_id, &lease_id, &mut tx).await?;
                    let transaction = transactions::insert_transaction(&duplicate, &mut tx).await?;
                    SettlementOutcome::Duplicate(transaction)
                },
            }
        } else {
            orders::release_lease(&order_id, &lease_id, &mut tx).await?;
            let transaction = transactions::insert_transaction(&transaction, &mut tx).await?;
            SettlementOutcome::Failed(transaction)
        };
        tx.commit().await?;
        trace!("🗃️ Settlement for order {order_id} recorded. Lease {lease_id} released.");
        Ok(outcome)
    }

    async fn close(&mut self) -> Result<(), LedgerError> {
        self.pool.close().await;
        Ok(())
    }
}

fn unique_violation(e: sqlx::Error, order_id: &OrderId) -> LedgerError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            LedgerError::DuplicateSuccessfulTransaction(order_id.clone())
        },
        _ => LedgerError::from(e),
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using `CHECKOUT_DATABASE_URL` and `CHECKOUT_DATABASE_MAX_CONNECTIONS`.
    pub async fn new() -> Result<Self, LedgerError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections()).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, LedgerError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date.
    pub async fn run_migrations(&self) -> Result<(), LedgerError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| LedgerError::DatabaseError(format!("Migration failed. {e}")))?;
        info!("🗃️ Migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
