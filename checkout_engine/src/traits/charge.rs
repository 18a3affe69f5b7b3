use std::future::Future;

use checkout_common::Secret;
use thiserror::Error;

use crate::db_types::MinorUnits;

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    /// Unique per attempt. Providers that support idempotency keys should send it, so that a retried request cannot
    /// charge twice.
    pub attempt_id: String,
    pub amount: MinorUnits,
    pub currency: String,
    pub source_token: Secret<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeReceipt {
    /// The processor's identifier for the charge.
    pub charge_id: String,
}

#[derive(Debug, Clone, Error)]
pub enum ChargeError {
    /// The processor saw the attempt and refused it.
    #[error("Charge declined ({code}): {message}")]
    Declined { charge_id: Option<String>, code: String, message: String },
    /// The processor could not be reached, or its answer could not be understood.
    #[error("Charge service unavailable: {0}")]
    Unavailable(String),
}

impl ChargeError {
    /// The processor's reference for the attempt, if it got that far.
    pub fn charge_id(&self) -> Option<&str> {
        match self {
            ChargeError::Declined { charge_id, .. } => charge_id.as_deref(),
            ChargeError::Unavailable(_) => None,
        }
    }
}

/// A card processor.
pub trait ChargeProvider: Clone + Send + Sync + 'static {
    /// Makes exactly one attempt to charge the source.
    fn charge(&self, request: ChargeRequest) -> impl Future<Output = Result<ChargeReceipt, ChargeError>> + Send;
}
