// events/bus/event_bus.rs
//
// Core event bus implementation.
//
// DESIGN PRINCIPLES:
// 1. Synchronous - listeners execute immediately in registration order
// 2. Observable - every dispatch is logged
// 3. Isolated - a panicking listener never stops the others
// 4. Injected - one instance per session, passed to whoever needs it

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Oldest dispatch log entries are dropped past this many
pub const MAX_EVENT_LOG: usize = 1024;

/// A registered listener. Identity (for `off`) is the `Arc` allocation.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// The Event Bus
///
/// Decouples control commands (`play`, `pause`) and narration notifications
/// (`started`, `paused`, `completed`, `error`) from their consumers.
///
/// Key characteristics:
/// - Events are plain names, payloads are JSON values (`Value::Null` when absent)
/// - The same listener may be registered several times; each registration counts
/// - Dispatching or removing on an unknown event is a no-op
pub struct EventBus {
    /// Map from event name to listeners, in registration order
    listeners: Arc<RwLock<HashMap<String, Vec<Listener>>>>,

    /// Dispatch log (for debugging), capped at `MAX_EVENT_LOG`
    event_log: Arc<RwLock<Vec<EventLogEntry>>>,
}

/// A logged dispatch for debugging
#[derive(Debug, Clone)]
pub struct EventLogEntry {
    pub event_type: String,
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub handler_count: usize,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(RwLock::new(HashMap::new())),
            event_log: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a listener for `event`.
    ///
    /// Returns the stored handle so the caller can pass it to [`EventBus::off`].
    pub fn on<F>(&self, event: &str, listener: F) -> Listener
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        self.on_listener(event, Arc::clone(&listener));
        listener
    }

    /// Register an existing listener handle (duplicates allowed)
    pub fn on_listener(&self, event: &str, listener: Listener) {
        let mut listeners = self.listeners.write().unwrap();
        listeners
            .entry(event.to_string())
            .or_insert_with(Vec::new)
            .push(listener);
    }

    /// Remove the first registration of `listener` for `event`.
    ///
    /// Returns whether a registration was removed.
    pub fn off(&self, event: &str, listener: &Listener) -> bool {
        let mut listeners = self.listeners.write().unwrap();
        let Some(registered) = listeners.get_mut(event) else {
            return false;
        };
        match registered.iter().position(|l| Arc::ptr_eq(l, listener)) {
            Some(idx) => {
                registered.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Dispatch `event` to every listener, in registration order.
    ///
    /// Listeners run on the caller's thread. A listener that panics is logged
    /// and the remaining listeners still run.
    pub fn dispatch(&self, event: &str, data: Value) {
        // Snapshot so listeners may register or remove listeners themselves
        let snapshot: Vec<Listener> = {
            let listeners = self.listeners.read().unwrap();
            listeners.get(event).cloned().unwrap_or_default()
        };

        let log_entry = EventLogEntry {
            event_type: event.to_string(),
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            handler_count: snapshot.len(),
        };

        log::debug!(
            "[EVENT] {} (id: {}) | {} listeners",
            log_entry.event_type,
            log_entry.event_id,
            log_entry.handler_count
        );

        {
            let mut log = self.event_log.write().unwrap();
            log.push(log_entry);
            if log.len() > MAX_EVENT_LOG {
                let excess = log.len() - MAX_EVENT_LOG;
                log.drain(..excess);
            }
        }

        for (idx, listener) in snapshot.iter().enumerate() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener(&data);
            }));

            if let Err(e) = result {
                log::error!(
                    "Listener {} for '{}' panicked: {}",
                    idx,
                    event,
                    panic_message(&e)
                );
            }
        }
    }

    /// Dispatch with no payload
    pub fn emit(&self, event: &str) {
        self.dispatch(event, Value::Null);
    }

    /// Remove every listener for every event
    pub fn clear(&self) {
        self.listeners.write().unwrap().clear();
    }

    /// Get the dispatch log (for debugging)
    pub fn get_event_log(&self) -> Vec<EventLogEntry> {
        self.event_log.read().unwrap().clone()
    }

    /// Clear the dispatch log
    pub fn clear_event_log(&self) {
        self.event_log.write().unwrap().clear();
    }

    /// Number of registrations for `event`
    pub fn listener_count(&self, event: &str) -> usize {
        let listeners = self.listeners.read().unwrap();
        listeners.get(event).map(|l| l.len()).unwrap_or(0)
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// Clones share the same listeners and log
impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            listeners: Arc::clone(&self.listeners),
            event_log: Arc::clone(&self.event_log),
        }
    }
}
