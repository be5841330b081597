use serde::{Deserialize, Serialize};

use crate::domain::activity::{QuickCheck, Reference};

/// One unit of the playback sequence.
///
/// `position` is the index in the built sequence and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    Video { position: usize, reference: Reference },
    QuickCheck { position: usize, quick_check: QuickCheck },
}

impl Action {
    pub fn position(&self) -> usize {
        match self {
            Action::Video { position, .. } => *position,
            Action::QuickCheck { position, .. } => *position,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Action::Video { .. })
    }

    pub fn is_quick_check(&self) -> bool {
        matches!(self, Action::QuickCheck { .. })
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Video { position, .. } => write!(f, "video@{}", position),
            Action::QuickCheck { position, .. } => write!(f, "quick_check@{}", position),
        }
    }
}
