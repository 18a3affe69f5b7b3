use crate::{
    db_types::{NewTransaction, Transaction},
    traits::{LedgerError, TransactionQueryFilter},
};

/// The append-only charge attempt journal.
#[allow(async_fn_in_trait)]
pub trait TransactionManagement {
    /// Appends a transaction on its own. The settlement flow does not use this; it records transactions as part of
    /// [`crate::traits::SettlementDatabase::record_settlement`].
    async fn append_transaction(&self, transaction: NewTransaction) -> Result<Transaction, LedgerError>;

    async fn fetch_transaction(&self, id: &str) -> Result<Option<Transaction>, LedgerError>;

    /// Lists transactions matching every criterion in `filter`, oldest first.
    async fn fetch_transactions(&self, filter: TransactionQueryFilter) -> Result<Vec<Transaction>, LedgerError>;
}
