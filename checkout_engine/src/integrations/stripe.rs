use std::{env, sync::Arc, time::Duration};

use checkout_common::{helpers::env_millis_or_default, Secret};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    StatusCode,
};
use serde::Deserialize;

use crate::traits::{ChargeError, ChargeProvider, ChargeReceipt, ChargeRequest};

const DEFAULT_API_URL: &str = "https://api.stripe.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(25_000);

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub api_url: String,
    pub secret_key: Secret<String>,
    pub timeout: Duration,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self { api_url: DEFAULT_API_URL.to_string(), secret_key: Secret::default(), timeout: DEFAULT_TIMEOUT }
    }
}

impl StripeConfig {
    pub fn from_env_or_default() -> Self {
        let api_url = env::var("CHECKOUT_STRIPE_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let secret_key = env::var("CHECKOUT_STRIPE_SECRET_KEY").ok().unwrap_or_else(|| {
            warn!("🪛️ CHECKOUT_STRIPE_SECRET_KEY is not set. Every charge will be rejected by the processor.");
            String::default()
        });
        let timeout = env_millis_or_default("CHECKOUT_STRIPE_TIMEOUT_MS", DEFAULT_TIMEOUT);
        Self { api_url, secret_key: Secret::new(secret_key), timeout }
    }
}

#[derive(Debug, Deserialize)]
struct ChargeResponse {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    failure_code: Option<String>,
    #[serde(default)]
    failure_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    charge: Option<String>,
}

/// Charges card sources through a Stripe-compatible `/v1/charges` endpoint.
#[derive(Clone)]
pub struct StripeCharger {
    config: StripeConfig,
    client: Arc<Client>,
}

impl StripeCharger {
    pub fn new(config: StripeConfig) -> Result<Self, ChargeError> {
        let mut headers = HeaderMap::with_capacity(1);
        let auth = HeaderValue::from_str(&format!("Bearer {}", config.secret_key.reveal()))
            .map_err(|e| ChargeError::Unavailable(format!("Invalid secret key. {e}")))?;
        headers.insert(AUTHORIZATION, auth);
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChargeError::Unavailable(format!("Could not build the HTTP client. {e}")))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url.trim_end_matches('/'))
    }
}

impl ChargeProvider for StripeCharger {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeReceipt, ChargeError> {
        let url = self.url("/v1/charges");
        let amount = request.amount.to_string();
        let currency = request.currency.to_lowercase();
        let params = [
            ("amount", amount.as_str()),
            ("currency", currency.as_str()),
            ("source", request.source_token.reveal().as_str()),
            ("description", request.description.as_str()),
        ];
        trace!("💳️ Sending charge {} for {amount} {currency}", request.attempt_id);
        let response = self
            .client
            .post(url)
            .header("Idempotency-Key", request.attempt_id.as_str())
            .form(&params)
            .send()
            .await
            .map_err(|e| ChargeError::Unavailable(e.to_string()))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| ChargeError::Unavailable(e.to_string()))?;
        interpret_response(status, &body)
    }
}

fn interpret_response(status: StatusCode, body: &str) -> Result<ChargeReceipt, ChargeError> {
    if status.is_success() {
        let charge = serde_json::from_str::<ChargeResponse>(body)
            .map_err(|e| ChargeError::Unavailable(format!("Unrecognised charge response. {e}")))?;
        if charge.status.as_deref() == Some("failed") {
            return Err(ChargeError::Declined {
                charge_id: Some(charge.id),
                code: charge.failure_code.unwrap_or_else(|| "card_declined".into()),
                message: charge.failure_message.unwrap_or_else(|| "The charge failed".into()),
            });
        }
        return Ok(ChargeReceipt { charge_id: charge.id });
    }
    let detail = serde_json::from_str::<ErrorResponse>(body).map(|r| r.error).unwrap_or_default();
    let message = detail.message.unwrap_or_else(|| format!("Charge request failed with status {status}"));
    let processor_failure = status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN;
    if processor_failure && detail.charge.is_none() {
        warn!("💳️ Charge service answered {status}: {message}");
        return Err(ChargeError::Unavailable(message));
    }
    Err(ChargeError::Declined {
        charge_id: detail.charge,
        code: detail.code.unwrap_or_else(|| format!("http_{}", status.as_u16())),
        message,
    })
}
