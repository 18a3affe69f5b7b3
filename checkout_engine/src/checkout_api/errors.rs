use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    db_types::OrderId,
    traits::{LedgerError, PricingError},
};

/// How a caller should treat a [`PaymentError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The request cannot succeed as it stands.
    Client,
    /// The caller may not perform the action.
    Authorization,
    /// A collaborator outside this system failed. Retrying later is safe.
    Upstream,
    /// The store failed. Nothing was committed.
    Persistence,
}

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
    #[error("{0} was not found")]
    NotFound(String),
    #[error("Order {0} has already been paid")]
    AlreadyPaid(OrderId),
    #[error("The order is priced in {expected}, but the payment is in {requested}")]
    CurrencyMismatch { expected: String, requested: String },
    #[error("You are not authorized to perform this action")]
    Unauthorized,
    #[error("The requested amount, {0}, does not match the order total")]
    AmountMismatch(u64),
    #[error("Price settings are unavailable: {0}")]
    PricingUnavailable(String),
    #[error("The charge service is unavailable: {reason}. The attempt was recorded as transaction {transaction_id}")]
    ChargeUnavailable { transaction_id: String, reason: String },
    #[error("A payment for order {0} is already in progress")]
    SettlementInProgress(OrderId),
    #[error("Order {0} has not been paid")]
    NotPaid(OrderId),
    #[error("Order {0} has already been shipped")]
    AlreadyShipped(OrderId),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PaymentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized => ErrorKind::Authorization,
            Self::PricingUnavailable(_) | Self::ChargeUnavailable { .. } => ErrorKind::Upstream,
            Self::DatabaseError(_) | Self::Internal(_) => ErrorKind::Persistence,
            _ => ErrorKind::Client,
        }
    }

    /// The HTTP status code a front end should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MalformedRequest(_)
            | Self::AlreadyPaid(_)
            | Self::CurrencyMismatch { .. }
            | Self::AmountMismatch(_)
            | Self::NotPaid(_) => 400,
            Self::Unauthorized => 401,
            Self::NotFound(_) => 404,
            Self::SettlementInProgress(_) | Self::AlreadyShipped(_) => 409,
            Self::PricingUnavailable(_) | Self::ChargeUnavailable { .. } => 502,
            Self::DatabaseError(_) | Self::Internal(_) => 500,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PricingUnavailable(_) | Self::ChargeUnavailable { .. } | Self::SettlementInProgress(_))
    }
}

impl From<LedgerError> for PaymentError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::OrderNotFound(id) => Self::NotFound(format!("Order {id}")),
            LedgerError::TransactionNotFound(id) => Self::NotFound(format!("Transaction {id}")),
            LedgerError::OrderAlreadyPaid(id) | LedgerError::DuplicateSuccessfulTransaction(id) => {
                Self::AlreadyPaid(id)
            },
            LedgerError::OrderNotPaid(id) => Self::NotPaid(id),
            LedgerError::OrderAlreadyShipped(id) => Self::AlreadyShipped(id),
            LedgerError::OwnershipConflict(_) => Self::Unauthorized,
            LedgerError::SettlementInProgress(id) => Self::SettlementInProgress(id),
            LedgerError::DatabaseError(s) => Self::DatabaseError(s),
            e @ (LedgerError::ModificationForbidden(..) |
            LedgerError::InvalidOrder(_) |
            LedgerError::ConversionError(_)) => {
                Self::Internal(e.to_string())
            },
        }
    }
}

impl From<PricingError> for PaymentError {
    fn from(e: PricingError) -> Self {
        match e {
            PricingError::Calculation(s) => Self::Internal(format!("Could not price the order. {s}")),
            e => Self::PricingUnavailable(e.to_string()),
        }
    }
}
