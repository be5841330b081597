// src/services/mod.rs
//
// Services Module - Orchestration Layer

pub mod audio_playback_service;
pub mod direction_line_orchestrator;
pub mod learning_session;

#[cfg(test)]
mod direction_line_orchestrator_tests;

pub use audio_playback_service::{
    extract_text_content, AudioPlaybackService, PlaybackCallbacks, DEFAULT_TTS_RATE,
};

pub use direction_line_orchestrator::{DirectionLineOrchestrator, NarrationSlot, SlotPhase};

pub use learning_session::{LearningSession, NarrationPhase};
