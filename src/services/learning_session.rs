// src/services/learning_session.rs
//
// Learning Session - ties the lesson flow together
//
// FLOW:
// - Screens: intro -> player -> diagnostic
// - On the player screen the action sequence drives which line is narrated
// - Completing the last action moves to the next screen
// - Every screen/action change builds a fresh direction line and arms it
//
// The session owns the sequence and screens; narration state lives in the
// orchestrator.

use std::sync::Arc;

use crate::domain::action::{Action, ActionSequence};
use crate::domain::activity::{validate_activity, ActivityInfo};
use crate::domain::direction_line::{
    action_params, diagnostic_params, intro_params, DirectionLine, DirectionLineParams,
};
use crate::domain::screen::{ScreenSequencer, DIAGNOSTIC_SCREEN, INTRO_SCREEN, PLAYER_SCREEN};
use crate::error::AppResult;
use crate::repositories::{PreferenceRepository, AUTOPLAY_KEY};
use crate::services::direction_line_orchestrator::{DirectionLineOrchestrator, NarrationSlot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationPhase {
    Intro,
    Player,
    Diagnostic,
}

pub struct LearningSession {
    activity: ActivityInfo,
    sequence: ActionSequence,
    screens: ScreenSequencer,
    orchestrator: DirectionLineOrchestrator,
    preferences: Arc<dyn PreferenceRepository>,
    /// Slot narrating the current step
    active_slot: Option<NarrationSlot>,
}

impl LearningSession {
    /// Validate the activity, build its sequence, and restore the autoplay preference
    pub fn new(
        activity: ActivityInfo,
        orchestrator: DirectionLineOrchestrator,
        preferences: Arc<dyn PreferenceRepository>,
    ) -> AppResult<Self> {
        validate_activity(&activity)?;

        let autoplay = preferences.get_bool(AUTOPLAY_KEY)?.unwrap_or(true);
        orchestrator.set_autoplay(autoplay);

        let sequence = ActionSequence::build(&activity);
        log::info!(
            "Session for '{}' ({} actions, autoplay {})",
            activity.title,
            sequence.len(),
            if autoplay { "on" } else { "off" }
        );

        Ok(Self {
            activity,
            sequence,
            screens: ScreenSequencer::lesson(),
            orchestrator,
            preferences,
            active_slot: None,
        })
    }

    pub fn activity(&self) -> &ActivityInfo {
        &self.activity
    }

    pub fn sequence(&self) -> &ActionSequence {
        &self.sequence
    }

    pub fn screens(&self) -> &ScreenSequencer {
        &self.screens
    }

    pub fn orchestrator(&self) -> &DirectionLineOrchestrator {
        &self.orchestrator
    }

    pub fn active_slot(&self) -> Option<NarrationSlot> {
        self.active_slot
    }

    pub fn phase(&self) -> NarrationPhase {
        match self.screens.current_screen().map(|s| s.id.as_str()) {
            Some(PLAYER_SCREEN) => NarrationPhase::Player,
            Some(DIAGNOSTIC_SCREEN) => NarrationPhase::Diagnostic,
            _ => NarrationPhase::Intro,
        }
    }

    /// Attach to the bus and narrate the first screen
    pub fn begin(&mut self) {
        self.orchestrator.attach_bus_listeners();
        self.sync_narration();
    }

    /// The learner finished the current step. Returns false once there is
    /// nowhere left to go.
    pub fn complete_current_action(&mut self) -> bool {
        let moved = match self.phase() {
            NarrationPhase::Player if !self.sequence.is_at_last() => self.sequence.advance(),
            _ => self.screens.go_to_next_screen(),
        };
        if moved {
            self.sync_narration();
        }
        moved
    }

    /// Jump straight to a screen
    pub fn enter_screen(&mut self, id: &str) -> bool {
        if !self.screens.go_to_screen(id) {
            return false;
        }
        self.sync_narration();
        true
    }

    /// Jump to an action on the player screen
    pub fn go_to_action(&mut self, index: usize) -> bool {
        if !self.sequence.go_to(index) {
            return false;
        }
        if self.phase() == NarrationPhase::Player {
            self.sync_narration();
        }
        true
    }

    /// Swap in a new activity: rebuild everything and restart at the intro
    pub fn reload(&mut self, activity: ActivityInfo) -> AppResult<()> {
        validate_activity(&activity)?;
        self.silence_active_slot();
        self.sequence = ActionSequence::build(&activity);
        self.activity = activity;
        self.screens.go_to_screen(INTRO_SCREEN);
        self.sync_narration();
        Ok(())
    }

    /// Flip autoplay, persist it, and return the new value
    pub fn toggle_autoplay(&mut self) -> AppResult<bool> {
        let enabled = !self.orchestrator.autoplay_enabled();
        self.preferences.set_bool(AUTOPLAY_KEY, enabled)?;
        self.orchestrator.set_autoplay(enabled);
        log::info!("Autoplay {}", if enabled { "enabled" } else { "disabled" });
        Ok(enabled)
    }

    pub fn end(&mut self) {
        self.orchestrator.cleanup();
        self.active_slot = None;
    }

    fn current_params(&self) -> Option<(NarrationSlot, DirectionLineParams)> {
        match self.phase() {
            NarrationPhase::Intro => Some((NarrationSlot::Main, intro_params(&self.activity))),
            NarrationPhase::Diagnostic => {
                Some((NarrationSlot::Main, diagnostic_params(&self.activity)))
            }
            NarrationPhase::Player => {
                let action = self.sequence.current()?;
                let slot = match action {
                    Action::Video { .. } => NarrationSlot::Main,
                    Action::QuickCheck { .. } => NarrationSlot::QuickCheck,
                };
                Some((slot, action_params(action)))
            }
        }
    }

    fn silence_active_slot(&mut self) {
        if let Some(slot) = self.active_slot.take() {
            if self.orchestrator.is_playing(slot) || self.orchestrator.has_pending_timer(slot) {
                self.orchestrator.pause(slot);
            }
        }
    }

    /// Build the line for the current position and arm it
    fn sync_narration(&mut self) {
        self.silence_active_slot();

        let Some((slot, mut params)) = self.current_params() else {
            log::info!("Nothing to narrate on the {:?} screen", self.phase());
            return;
        };

        if params.language_code.is_none() {
            params.language_code = Some(self.orchestrator.default_language().to_string());
        }

        self.orchestrator.set_current(slot, DirectionLine::new(params));
        self.orchestrator.start(slot);
        self.active_slot = Some(slot);
    }
}
