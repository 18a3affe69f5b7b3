use std::future::Future;

use crate::traits::{
    LeaseRequest,
    LedgerError,
    OrderManagement,
    SettlementLease,
    SettlementOutcome,
    SettlementRecord,
    TransactionManagement,
};

/// The highest level of behaviour a backend must provide to support payment settlement.
///
/// Settling an order involves a network call to the card processor that can take seconds. No store transaction is held
/// open over that call. Instead the order is protected by a short-lived *settlement lease*:
///
/// 1. [`acquire_settlement_lease`](Self::acquire_settlement_lease) takes the lease with a single conditional update.
///    Only one caller can hold a live lease on an order at a time.
/// 2. The charge is attempted.
/// 3. [`record_settlement`](Self::record_settlement) writes the transaction and the order changes in one atomic unit,
///    and releases the lease.
///
/// Both methods return `Send` futures so that steps 2 and 3 can run on a detached task.
#[allow(async_fn_in_trait)]
pub trait SettlementDatabase: OrderManagement + TransactionManagement + Clone + Send + Sync + 'static {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Takes the settlement lease on an order, binding the claimant as owner if the order is anonymous.
    ///
    /// Fails with
    /// * [`LedgerError::OrderNotFound`] if the order does not exist or was deleted,
    /// * [`LedgerError::OrderAlreadyPaid`] if the order is paid,
    /// * [`LedgerError::OwnershipConflict`] if the order belongs to someone other than the claimant,
    /// * [`LedgerError::SettlementInProgress`] if another unexpired lease is held.
    fn acquire_settlement_lease(
        &self,
        request: LeaseRequest,
    ) -> impl Future<Output = Result<SettlementLease, LedgerError>> + Send;

    /// Records the outcome of a charge attempt and releases the lease.
    ///
    /// A successful attempt marks the order paid and stores the recomputed totals, unless the order was paid in the
    /// meantime. In that case the attempt is stored as a failed `duplicate_charge` and
    /// [`SettlementOutcome::Duplicate`] is returned.
    fn record_settlement(
        &self,
        record: SettlementRecord,
    ) -> impl Future<Output = Result<SettlementOutcome, LedgerError>> + Send;

    async fn close(&mut self) -> Result<(), LedgerError>;
}
