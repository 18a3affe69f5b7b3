//! # Checkout settlement public API
//!
//! The `checkout_api` module exposes the programmatic API for the settlement engine.
//!
//! * [`payment_flow_api`] creates orders, takes payment for them and moves them through fulfilment.
//! * [`transactions_api`] lists charge attempts, subject to the ownership rules in [`auth`].
//!
//! # API usage
//!
//! An API instance is created by supplying the backends it needs:
//!
//! ```rust,ignore
//! let db = SqliteDatabase::new_with_url("sqlite://data/checkout_store.db", 5).await?;
//! let pricing = SitePricing::new(SitePricingConfig::from_env_or_default())?;
//! let charger = StripeCharger::new(StripeConfig::from_env_or_default())?;
//! let api = PaymentFlowApi::new(db, pricing, charger, SettlementConfig::from_env_or_default(), producers);
//! let tx = api.settle(&order_id, PaymentRequest::new(1000, "USD", "tok_visa"), Some(&claims)).await?;
//! ```
pub mod auth;
pub mod errors;
pub mod payment_flow_api;
pub mod payment_objects;
pub mod transactions_api;
