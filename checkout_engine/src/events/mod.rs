//! Post-settlement notifications.
//!
//! Successful settlements are announced on two hook slots. Each slot is backed by its own channel and handler task,
//! so a slow or failing hook never holds up the settlement that triggered it.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler, HandlerResult, HandlerStats};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
