use serde::{Deserialize, Serialize};

use crate::db_types::{Order, Transaction};

/// Emitted once for every settlement that moved an order to `paid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSettledEvent {
    /// The order, as it was committed.
    pub order: Order,
    /// The successful charge.
    pub transaction: Transaction,
}

impl PaymentSettledEvent {
    pub fn new(order: Order, transaction: Transaction) -> Self {
        Self { order, transaction }
    }
}
