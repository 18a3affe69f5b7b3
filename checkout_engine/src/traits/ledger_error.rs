use thiserror::Error;

use crate::db_types::OrderId;

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Transaction {0} does not exist")]
    TransactionNotFound(String),
    #[error("Order {0} has already been paid")]
    OrderAlreadyPaid(OrderId),
    #[error("Order {0} has not been paid")]
    OrderNotPaid(OrderId),
    #[error("Order {0} has already been shipped")]
    OrderAlreadyShipped(OrderId),
    #[error("Order {0} belongs to someone else")]
    OwnershipConflict(OrderId),
    #[error("Another settlement for order {0} is in progress")]
    SettlementInProgress(OrderId),
    #[error("Order {0} already has a successful transaction")]
    DuplicateSuccessfulTransaction(OrderId),
    #[error("Cannot modify order {0}: {1}")]
    ModificationForbidden(OrderId, String),
    #[error("Order cannot be stored: {0}")]
    InvalidOrder(String),
    #[error("Stored data could not be decoded: {0}")]
    ConversionError(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}
