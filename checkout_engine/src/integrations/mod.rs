//! HTTP-backed implementations of the pricing and charge collaborators.
mod site_pricing;
mod stripe;

pub use site_pricing::{SitePricing, SitePricingConfig};
pub use stripe::{StripeCharger, StripeConfig};
