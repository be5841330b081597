// src/domain/mod.rs
//
// Domain Root - The Single Source of Truth for Domain API
//
// All other modules import from `crate::domain::*`

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod action;
pub mod activity;
pub mod direction_line;
pub mod screen;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use action::{Action, ActionSequence};

pub use activity::{
    validate_activity, ActivityInfo, Diagnostic, DiagnosticItem, QuickCheck,
    QuickCheckDirectionLine, Reference,
};

pub use direction_line::{derive_audio_path, DirectionLine, DirectionLineParams, StepKind};

pub use screen::{Screen, ScreenSequencer};

// ============================================================================
// DOMAIN ERROR TYPES
// ============================================================================

use thiserror::Error;

/// Domain-level errors
/// These represent violations of the activity's own rules
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

/// Domain result type
pub type DomainResult<T> = Result<T, DomainError>;
