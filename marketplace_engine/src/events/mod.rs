mod channel;
mod event_types;
mod hooks;

pub use channel::{EventProducer, Handler, HookDispatcher};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
