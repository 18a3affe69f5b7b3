//! Checkout Settlement Engine
//!
//! This library takes payment for checkout orders. It recomputes what an order should cost, charges the customer's
//! card through an external processor, and records the outcome while moving the order to its next state. It is
//! transport-agnostic: there is no HTTP server in here, only the library calls a server would make.
//!
//! The library is divided into these main sections:
//! 1. Storage ([`traits`] and [`SqliteDatabase`]). The traits define what the engine needs from a store. SQLite is the
//!    bundled backend. The data types used in the store are defined in [`db_types`] and are public.
//! 2. The public API ([`PaymentFlowApi`] and [`TransactionsApi`]). These provide settlement, fulfilment and listing,
//!    including the ownership rules in [`auth`].
//! 3. Collaborators ([`integrations`]). The price settings come from the shop's website and charges go to a
//!    Stripe-compatible processor. Both sit behind traits so they can be swapped out.
//!
//! Successful settlements are announced through [`events`]. Hook handlers run on their own tasks, so they never delay
//! or fail a payment.
mod checkout_api;

pub mod config;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod integrations;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use checkout_api::{
    auth::{self, authorize_payment, is_admin, is_owner, Claims, PaymentAuthorization},
    errors::{ErrorKind, PaymentError},
    payment_flow_api::{PaymentFlowApi, CHARGE_TIMEOUT_CODE, CHARGE_UNAVAILABLE_CODE},
    payment_objects::{PaymentRequest, DEFAULT_CURRENCY},
    transactions_api::TransactionsApi,
};
pub use config::SettlementConfig;
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteDatabase, DUPLICATE_CHARGE_CODE};
pub use traits::{
    ChargeProvider,
    LedgerError,
    OrderManagement,
    PricingService,
    SettlementDatabase,
    TransactionManagement,
};
