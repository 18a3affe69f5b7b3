//! Value types shared by the checkout crates.
//!
//! * [`MinorUnits`] is the money type. All amounts in the system are non-negative integers in the minor unit of their
//!   currency (cents for USD, for example).
//! * [`Secret`] wraps configuration values that must never end up in logs.
//! * [`helpers`] has small parsing utilities for environment-driven configuration.
mod minor_units;

pub mod helpers;
pub mod op;
mod secret;

pub use minor_units::{MinorUnits, MinorUnitsConversionError};
pub use secret::Secret;
