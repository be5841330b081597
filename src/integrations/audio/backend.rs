// src/integrations/audio/backend.rs
//
// Audio capability boundary
//
// Everything the narration pipeline needs from the platform goes through
// these traits: existence checks for recorded audio, media handles for file
// playback, and the speech synthesizer. The real implementation lives in
// `system.rs`; tests script a deterministic double.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::AppResult;

/// Lifecycle notifications from a media handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    /// Enough data is buffered to play to the end
    CanPlayThrough,
    /// Audio is actually coming out
    Playing,
    Ended,
    Error(String),
}

/// Lifecycle notifications for one utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Start,
    End,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub lang: String,
    /// Speaking rate, 1.0 is normal speed
    pub rate: f32,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// HEAD-style existence check for a recorded audio file
    async fn resource_exists(&self, path: &str) -> AppResult<bool>;

    /// Create (but do not start) a media handle for `path`
    fn open_media(&self, path: &str) -> AppResult<Arc<dyn MediaHandle>>;

    /// Speech synthesis, if the runtime has it
    fn speech(&self) -> Option<Arc<dyn SpeechSynthesizer>>;
}

#[async_trait]
pub trait MediaHandle: Send + Sync {
    fn path(&self) -> &str;

    /// Whether the handle is already buffered enough to start immediately
    fn can_play_through(&self) -> bool;

    /// Register a listener. Events emitted before this call are not replayed.
    fn events(&self) -> mpsc::UnboundedReceiver<MediaEvent>;

    /// Request playback start. Errors if the request itself is refused.
    async fn play(&self) -> AppResult<()>;

    fn pause(&self);

    /// Seek back to the beginning
    fn rewind(&self);
}

pub trait SpeechSynthesizer: Send + Sync {
    /// Drop the queued and currently speaking utterances
    fn cancel(&self);

    /// Queue an utterance; the receiver yields its start/end/error events
    fn speak(&self, utterance: Utterance) -> mpsc::UnboundedReceiver<SpeechEvent>;
}
