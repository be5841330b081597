// src/lib.rs
// Lessonflow - guided video lessons with narrated direction lines
//
// Architecture:
// - Domain-centric: activity parsing, action sequencing and screen order live in domain/
// - Event-driven: narration reports through the EventBus, never through return values
// - Explicit: platform audio sits behind the AudioBackend trait, injected at startup
// - Session layer: LearningSession ties screens, actions and narration together

// ============================================================================
// FOUNDATION
// ============================================================================

pub mod domain;
pub mod error;
pub mod events;
pub mod repositories;
pub mod services;

// ============================================================================
// APPLICATION LAYER
// ============================================================================

pub mod application;
pub mod integrations;

// ============================================================================
// PUBLIC API - Domain Entities
// ============================================================================

pub use domain::{
    derive_audio_path,
    validate_activity,
    // Actions
    Action,
    ActionSequence,
    // Activity
    ActivityInfo,
    Diagnostic,
    DiagnosticItem,
    // Direction lines
    DirectionLine,
    DirectionLineParams,
    QuickCheck,
    QuickCheckDirectionLine,
    Reference,
    // Screens
    Screen,
    ScreenSequencer,
    StepKind,
};

// ============================================================================
// PUBLIC API - Error Types
// ============================================================================

pub use error::{AppError, AppResult};

// ============================================================================
// PUBLIC API - Events
// ============================================================================

pub use events::{
    EventBus, EventLogEntry, Listener, NarrationCommand, NarrationEvent,
    NarrationNotice,
};

// ============================================================================
// PUBLIC API - Repositories
// ============================================================================

pub use repositories::{
    InMemoryPreferenceRepository, JsonFilePreferenceRepository, PreferenceRepository,
    AUTOPLAY_KEY,
};

// ============================================================================
// PUBLIC API - Services
// ============================================================================

pub use services::{
    extract_text_content,
    // Audio playback
    AudioPlaybackService,
    // Orchestration
    DirectionLineOrchestrator,
    // Session
    LearningSession,
    NarrationPhase,
    NarrationSlot,
    PlaybackCallbacks,
    SlotPhase,
};

// ============================================================================
// PUBLIC API - Application Layer
// ============================================================================

pub use application::{AppState, NarrationConfig};

// ============================================================================
// PUBLIC API - Integrations
// ============================================================================

pub use integrations::{AudioBackend, SystemBackend};
