pub mod event_bus;

pub use event_bus::{EventBus, EventLogEntry, Listener, MAX_EVENT_LOG};
