//! # Ledger and collaborator contracts
//!
//! This module defines the interfaces that the settlement engine depends on. Nothing in here knows about SQLite or
//! HTTP; the concrete backends live in [`crate::sqlite`] and [`crate::integrations`].
//!
//! * [`OrderManagement`] reads and writes orders.
//! * [`TransactionManagement`] appends and lists charge attempts. Transactions are never modified once written.
//! * [`SettlementDatabase`] adds the two short atomic units that bracket a charge: acquiring the settlement lease, and
//!   recording the outcome.
//! * [`PricingService`] fetches the shop's price settings and prices a set of line items.
//! * [`ChargeProvider`] talks to the card processor.
mod charge;
mod data_objects;
mod ledger_error;
mod order_management;
mod pricing;
mod settlement_database;
mod transaction_management;

pub use charge::{ChargeError, ChargeProvider, ChargeReceipt, ChargeRequest};
pub use data_objects::{LeaseRequest, SettlementLease, SettlementOutcome, SettlementRecord, TransactionQueryFilter};
pub use ledger_error::LedgerError;
pub use order_management::OrderManagement;
pub use pricing::{PricingError, PricingService};
pub use settlement_database::SettlementDatabase;
pub use transaction_management::TransactionManagement;
