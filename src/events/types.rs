// events/types.rs
//
// Event names and payloads carried on the bus.
//
// RULES:
// - `play` / `pause` are commands, consumed by the orchestrator
// - `started` / `paused` / `completed` / `error` are facts, emitted by it
// - Payloads are serialized structs, never ad-hoc maps

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::services::NarrationSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NarrationEvent {
    Play,
    Pause,
    Started,
    Paused,
    Completed,
    Error,
}

impl NarrationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            NarrationEvent::Play => "play",
            NarrationEvent::Pause => "pause",
            NarrationEvent::Started => "started",
            NarrationEvent::Paused => "paused",
            NarrationEvent::Completed => "completed",
            NarrationEvent::Error => "error",
        }
    }
}

impl std::fmt::Display for NarrationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of `play` / `pause` commands. An absent or unreadable payload
/// addresses the main slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrationCommand {
    #[serde(default)]
    pub slot: NarrationSlot,
}

impl NarrationCommand {
    pub fn from_data(data: &Value) -> Self {
        serde_json::from_value(data.clone()).unwrap_or_default()
    }
}

/// Payload of the notifications emitted by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrationNotice {
    pub slot: NarrationSlot,
    pub step_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
}

impl NarrationNotice {
    pub fn new(slot: NarrationSlot, step_id: Option<String>) -> Self {
        Self {
            slot,
            step_id,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Whether this notice reports on `step_id` in `slot`
    pub fn is_for(&self, slot: NarrationSlot, step_id: &str) -> bool {
        self.slot == slot && self.step_id.as_deref() == Some(step_id)
    }

    pub fn to_data(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
