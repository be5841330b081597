// src/application/state.rs

use std::sync::Arc;

use crate::application::NarrationConfig;
use crate::domain::ActivityInfo;
use crate::error::AppResult;
use crate::events::EventBus;
use crate::integrations::AudioBackend;
use crate::repositories::PreferenceRepository;
use crate::services::{AudioPlaybackService, DirectionLineOrchestrator, LearningSession};

/// Shared narration stack.
/// All fields are Arc-wrapped (or cheaply cloneable) for sharing with listeners.
/// Wiring order mirrors the binary: bus, playback, orchestrator.
pub struct AppState {
    pub config: NarrationConfig,
    pub event_bus: Arc<EventBus>,
    pub playback_service: Arc<AudioPlaybackService>,
    pub orchestrator: DirectionLineOrchestrator,
    pub preferences: Arc<dyn PreferenceRepository>,
}

impl AppState {
    pub fn new(
        config: NarrationConfig,
        backend: Arc<dyn AudioBackend>,
        preferences: Arc<dyn PreferenceRepository>,
    ) -> Self {
        let event_bus = Arc::new(EventBus::new());
        let playback_service = Arc::new(AudioPlaybackService::new(backend, config.tts_rate));
        let orchestrator =
            DirectionLineOrchestrator::new(playback_service.clone(), event_bus.clone(), &config);

        Self {
            config,
            event_bus,
            playback_service,
            orchestrator,
            preferences,
        }
    }

    /// Start a session for `activity` on this stack
    pub fn open_session(&self, activity: ActivityInfo) -> AppResult<LearningSession> {
        LearningSession::new(
            activity,
            self.orchestrator.clone(),
            self.preferences.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::audio::scripted::ScriptedBackend;
    use crate::repositories::InMemoryPreferenceRepository;
    use crate::services::NarrationSlot;

    #[tokio::test(start_paused = true)]
    async fn test_session_shares_the_orchestrator() {
        let state = AppState::new(
            NarrationConfig::default(),
            Arc::new(ScriptedBackend::new()),
            Arc::new(InMemoryPreferenceRepository::new()),
        );

        let mut session = state.open_session(ActivityInfo::default()).unwrap();
        session.begin();

        assert!(state.orchestrator.current(NarrationSlot::Main).is_some());
        assert_eq!(state.event_bus.listener_count("play"), 1);

        session.end();
        assert_eq!(state.event_bus.listener_count("play"), 0);
    }
}
