pub mod entity;
pub mod invariants;

pub use entity::{
    ActivityInfo, Diagnostic, DiagnosticItem, QuickCheck, QuickCheckDirectionLine, Reference,
};
pub use invariants::validate_activity;
