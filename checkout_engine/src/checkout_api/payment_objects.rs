use serde::{Deserialize, Serialize};

pub const DEFAULT_CURRENCY: &str = "USD";

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

/// A request to pay for an order.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    /// Amount in minor units. It must equal the order total exactly.
    pub amount: u64,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Card source token issued by the processor's client library.
    pub source_token: String,
}

impl Default for PaymentRequest {
    fn default() -> Self {
        Self { amount: 0, currency: default_currency(), source_token: String::new() }
    }
}

impl std::fmt::Debug for PaymentRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentRequest")
            .field("amount", &self.amount)
            .field("currency", &self.currency)
            .field("source_token", &"****")
            .finish()
    }
}

impl PaymentRequest {
    pub fn new<S: Into<String>>(amount: u64, currency: S, source_token: S) -> Self {
        Self { amount, currency: currency.into(), source_token: source_token.into() }
    }
}
