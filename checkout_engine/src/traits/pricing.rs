use std::future::Future;

use chrono::Utc;
use thiserror::Error;

use crate::{
    db_types::{Coupon, LineItem, Price, PriceSettings},
    helpers::price_calculator,
};

#[derive(Debug, Clone, Error)]
pub enum PricingError {
    #[error("Could not fetch price settings: {0}")]
    Unreachable(String),
    #[error("Price settings request failed with status {0}")]
    UnexpectedStatus(u16),
    #[error("Price settings could not be decoded: {0}")]
    Malformed(String),
    #[error("Could not price the order: {0}")]
    Calculation(String),
}

/// Prices orders.
///
/// Settings are fetched afresh for every call to the engine; implementations should not cache them.
pub trait PricingService: Clone + Send + Sync + 'static {
    fn fetch_settings(&self) -> impl Future<Output = Result<PriceSettings, PricingError>> + Send;

    /// Computes the price of `items`. Shipping is not included. The default implementation uses the basic calculator
    /// in [`price_calculator`].
    fn compute(
        &self,
        settings: &PriceSettings,
        coupon: Option<&Coupon>,
        country: &str,
        currency: &str,
        items: &[LineItem],
    ) -> Result<Price, PricingError> {
        price_calculator::calculate(settings, coupon, country, currency, items, Utc::now())
    }
}
