// src/domain/action/sequence.rs
//
// Action Sequence - merges videos and quick checks into one ordered list
//
// RULES:
// - Video and quick check at the same index interleave, video first
// - Items past the shorter list's length appear unpaired
// - The cursor never leaves [0, len) for a non-empty sequence
// - Out-of-range jumps are ignored, never panic

use serde::Serialize;

use super::entity::Action;
use crate::domain::activity::ActivityInfo;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ActionSequence {
    actions: Vec<Action>,
    current_index: usize,
}

impl ActionSequence {
    /// Build the playback sequence for an activity
    pub fn build(activity: &ActivityInfo) -> Self {
        let references = &activity.references;
        let quick_checks = &activity.quick_checks;
        let paired = references.len().max(quick_checks.len());

        let mut actions = Vec::with_capacity(references.len() + quick_checks.len());

        for i in 0..paired {
            if let Some(reference) = references.get(i) {
                actions.push(Action::Video {
                    position: actions.len(),
                    reference: reference.clone(),
                });
            }
            if let Some(quick_check) = quick_checks.get(i) {
                actions.push(Action::QuickCheck {
                    position: actions.len(),
                    quick_check: quick_check.clone(),
                });
            }
        }

        // Leftover quick checks. `paired` already covers every index, so this never runs.
        for quick_check in quick_checks.iter().skip(paired) {
            actions.push(Action::QuickCheck {
                position: actions.len(),
                quick_check: quick_check.clone(),
            });
        }

        log::debug!(
            "Built action sequence: {} videos, {} quick checks, {} actions",
            references.len(),
            quick_checks.len(),
            actions.len()
        );

        Self {
            actions,
            current_index: 0,
        }
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Cursor position, `None` when there are no actions
    pub fn current_index(&self) -> Option<usize> {
        if self.actions.is_empty() {
            None
        } else {
            Some(self.current_index)
        }
    }

    pub fn current(&self) -> Option<&Action> {
        self.actions.get(self.current_index)
    }

    pub fn has_next(&self) -> bool {
        !self.actions.is_empty() && self.current_index < self.actions.len() - 1
    }

    /// True on the final action, and also when there is nothing to do at all
    pub fn is_at_last(&self) -> bool {
        self.actions.is_empty() || self.current_index == self.actions.len() - 1
    }

    /// Move to the next action. Returns whether the cursor moved.
    pub fn advance(&mut self) -> bool {
        if !self.has_next() {
            return false;
        }
        self.current_index += 1;
        true
    }

    /// Jump to `index`. Returns whether the cursor moved.
    pub fn go_to(&mut self, index: usize) -> bool {
        if index >= self.actions.len() {
            log::debug!(
                "Ignoring jump to action {} (sequence has {})",
                index,
                self.actions.len()
            );
            return false;
        }
        self.current_index = index;
        true
    }

    pub fn reset(&mut self) {
        self.current_index = 0;
    }
}
