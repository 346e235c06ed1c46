//! Settlement events and the hook system that delivers them.
//!
//! Events are published only after the corresponding database transaction has committed. Delivery is best-effort:
//! if a subscriber has gone away, the failure is logged and the operation that produced the event still succeeds.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
