// src/events/mod.rs
//
// Internal Event System - Public API

pub mod bus;
pub mod types;

pub use bus::{EventBus, EventLogEntry, Listener, MAX_EVENT_LOG};
pub use types::{NarrationCommand, NarrationEvent, NarrationNotice};
