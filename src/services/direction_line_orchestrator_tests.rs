// src/services/direction_line_orchestrator_tests.rs
//
// Narration state machine: timers, fallback, pause races, bus commands.
// All tests run on tokio's paused clock.

use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::application::NarrationConfig;
use crate::domain::direction_line::{DirectionLine, DirectionLineParams, StepKind};
use crate::events::{EventBus, NarrationEvent};
use crate::integrations::audio::scripted::{MediaScript, ScriptedBackend};
use crate::integrations::audio::AudioBackend;
use crate::services::audio_playback_service::{AudioPlaybackService, DEFAULT_TTS_RATE};
use crate::services::direction_line_orchestrator::{
    DirectionLineOrchestrator, NarrationSlot, SlotPhase,
};

struct Harness {
    backend: Arc<ScriptedBackend>,
    bus: Arc<EventBus>,
    orchestrator: DirectionLineOrchestrator,
    events: Arc<Mutex<Vec<(String, Value)>>>,
}

impl Harness {
    fn new(backend: ScriptedBackend) -> Self {
        let backend = Arc::new(backend);
        let dyn_backend: Arc<dyn AudioBackend> = backend.clone();
        let playback = Arc::new(AudioPlaybackService::new(dyn_backend, DEFAULT_TTS_RATE));
        let bus = Arc::new(EventBus::new());
        let orchestrator =
            DirectionLineOrchestrator::new(playback, bus.clone(), &NarrationConfig::default());

        let events = Arc::new(Mutex::new(Vec::new()));
        for event in [
            NarrationEvent::Started,
            NarrationEvent::Paused,
            NarrationEvent::Completed,
            NarrationEvent::Error,
        ] {
            let events = Arc::clone(&events);
            bus.on(event.as_str(), move |data| {
                events
                    .lock()
                    .unwrap()
                    .push((event.as_str().to_string(), data.clone()));
            });
        }

        Self {
            backend,
            bus,
            orchestrator,
            events,
        }
    }

    fn event_names(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn events_by_slot(&self) -> Vec<(String, String)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(name, data)| {
                let slot = data["slot"].as_str().unwrap_or_default().to_string();
                (name.clone(), slot)
            })
            .collect()
    }

    fn arm(&self, slot: NarrationSlot, step_id: &str, is_new: bool) -> Arc<DirectionLine> {
        let mut params = DirectionLineParams::new(step_id, StepKind::VideoStep);
        params.text = Some(format!("Narration for {}", step_id));
        params.is_new = is_new;
        let line = self.orchestrator.set_current(slot, DirectionLine::new(params));
        self.orchestrator.start(slot);
        line
    }
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_start_without_line_is_noop() {
    let h = Harness::new(ScriptedBackend::new());

    h.orchestrator.start(NarrationSlot::Main);

    assert!(!h.orchestrator.is_playing(NarrationSlot::Main));
    assert!(!h.orchestrator.has_pending_timer(NarrationSlot::Main));
    assert_eq!(h.orchestrator.phase(NarrationSlot::Main), SlotPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_autoplay_fires_after_delay_and_uses_tts() {
    let h = Harness::new(ScriptedBackend::new());
    h.arm(NarrationSlot::Main, "v1", true);

    assert!(h.orchestrator.is_playing(NarrationSlot::Main));
    assert_eq!(h.orchestrator.phase(NarrationSlot::Main), SlotPhase::Armed);

    advance(490).await;
    assert!(h.backend.spoken().is_empty());

    advance(20).await;
    assert_eq!(h.backend.spoken().len(), 1);
    assert_eq!(h.backend.spoken()[0].text, "Narration for v1");
    assert_eq!(h.orchestrator.phase(NarrationSlot::Main), SlotPhase::Playing);

    advance(1500).await;
    assert!(!h.orchestrator.is_playing(NarrationSlot::Main));
    assert_eq!(h.event_names(), vec!["started", "completed"]);
    assert_eq!(
        h.events.lock().unwrap()[1].1,
        json!({"slot": "main", "step_id": "v1"})
    );
}

#[tokio::test(start_paused = true)]
async fn test_restart_replaces_pending_timer() {
    let h = Harness::new(ScriptedBackend::new());
    h.arm(NarrationSlot::Main, "v1", true);

    advance(300).await;
    h.orchestrator.start(NarrationSlot::Main);

    advance(300).await;
    assert!(h.backend.spoken().is_empty());

    advance(300).await;
    assert_eq!(h.backend.spoken().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stale_timer_does_not_play_replaced_line() {
    let h = Harness::new(ScriptedBackend::new());
    h.arm(NarrationSlot::Main, "v1", true);

    advance(100).await;
    let mut params = DirectionLineParams::new("v2", StepKind::VideoStep);
    params.is_new = true;
    h.orchestrator
        .set_current(NarrationSlot::Main, DirectionLine::new(params));

    advance(2000).await;
    assert!(h.backend.spoken().is_empty());
    assert!(!h.orchestrator.has_pending_timer(NarrationSlot::Main));
}

#[tokio::test(start_paused = true)]
async fn test_line_that_is_not_new_does_not_autoplay() {
    let h = Harness::new(ScriptedBackend::new());
    h.arm(NarrationSlot::Main, "v1", false);

    advance(2000).await;

    assert!(h.backend.spoken().is_empty());
    assert!(!h.orchestrator.is_playing(NarrationSlot::Main));
}

#[tokio::test(start_paused = true)]
async fn test_autoplay_disabled_waits_for_explicit_play() {
    let h = Harness::new(ScriptedBackend::new());
    h.orchestrator.set_autoplay(false);
    h.arm(NarrationSlot::Main, "v1", true);

    advance(2000).await;
    assert!(h.backend.spoken().is_empty());

    h.orchestrator.play(NarrationSlot::Main).await;
    assert_eq!(h.backend.spoken().len(), 1);
    assert_eq!(h.event_names(), vec!["started", "completed"]);
}

#[tokio::test(start_paused = true)]
async fn test_recorded_audio_preferred_when_available() {
    let h = Harness::new(
        ScriptedBackend::new()
            .with_file("/audio/direction-lines/v1/en.mp3", MediaScript::PlayThrough),
    );
    h.arm(NarrationSlot::Main, "v1", true);

    advance(3000).await;

    assert_eq!(
        h.backend.opened_paths(),
        vec!["/audio/direction-lines/v1/en.mp3"]
    );
    assert!(h.backend.spoken().is_empty());
    assert_eq!(h.backend.head_checks.load(Ordering::SeqCst), 1);
    assert_eq!(h.event_names(), vec!["started", "completed"]);
}

#[tokio::test(start_paused = true)]
async fn test_file_error_retries_with_tts_once() {
    let h = Harness::new(
        ScriptedBackend::new()
            .with_file("/audio/direction-lines/v1/en.mp3", MediaScript::FailMidway),
    );
    h.arm(NarrationSlot::Main, "v1", true);

    advance(5000).await;

    assert_eq!(h.backend.opened_paths().len(), 1);
    assert_eq!(h.backend.spoken().len(), 1);
    assert_eq!(
        h.event_names(),
        vec!["started", "error", "started", "completed"]
    );
    assert!(!h.orchestrator.is_playing(NarrationSlot::Main));
}

#[tokio::test(start_paused = true)]
async fn test_failed_availability_check_uses_tts() {
    let h = Harness::new(ScriptedBackend::new().failing_head_checks());
    h.arm(NarrationSlot::Main, "v1", true);

    advance(2000).await;

    assert!(h.backend.opened_paths().is_empty());
    assert_eq!(h.backend.spoken().len(), 1);
    assert_eq!(h.event_names(), vec!["started", "completed"]);
}

#[tokio::test(start_paused = true)]
async fn test_late_ended_after_pause_is_ignored() {
    let h = Harness::new(
        ScriptedBackend::new()
            .with_file("/audio/direction-lines/v1/en.mp3", MediaScript::PlayThrough),
    );
    h.arm(NarrationSlot::Main, "v1", true);

    advance(600).await;
    assert!(h.orchestrator.is_playing(NarrationSlot::Main));

    h.orchestrator.pause(NarrationSlot::Main);
    assert!(!h.orchestrator.is_playing(NarrationSlot::Main));

    // The scripted media still delivers "ended" at the 2.5s mark
    advance(3000).await;

    assert!(!h.orchestrator.is_playing(NarrationSlot::Main));
    assert_eq!(h.event_names(), vec!["started", "paused"]);
}

#[tokio::test(start_paused = true)]
async fn test_pause_during_tts_suppresses_interrupted_error() {
    let h = Harness::new(ScriptedBackend::new());
    h.arm(NarrationSlot::Main, "v1", true);

    advance(600).await;
    h.orchestrator.pause(NarrationSlot::Main);
    advance(2000).await;

    assert!(!h.orchestrator.is_playing(NarrationSlot::Main));
    assert_eq!(h.event_names(), vec!["started", "paused"]);
}

#[tokio::test(start_paused = true)]
async fn test_pause_clears_pending_timer() {
    let h = Harness::new(ScriptedBackend::new());
    h.arm(NarrationSlot::Main, "v1", true);

    advance(100).await;
    h.orchestrator.pause(NarrationSlot::Main);
    assert!(!h.orchestrator.has_pending_timer(NarrationSlot::Main));

    advance(2000).await;
    assert!(h.backend.spoken().is_empty());
    assert_eq!(h.event_names(), vec!["paused"]);
}

#[tokio::test(start_paused = true)]
async fn test_slots_are_independent() {
    let h = Harness::new(ScriptedBackend::new());
    h.arm(NarrationSlot::Main, "v1", true);
    h.arm(NarrationSlot::QuickCheck, "q1", true);

    assert!(h.orchestrator.has_pending_timer(NarrationSlot::Main));
    assert!(h.orchestrator.has_pending_timer(NarrationSlot::QuickCheck));

    h.orchestrator.set_current(
        NarrationSlot::QuickCheck,
        DirectionLine::new(DirectionLineParams::new("q2", StepKind::QuickCheck)),
    );
    advance(600).await;

    let spoken: Vec<String> = h.backend.spoken().into_iter().map(|u| u.text).collect();
    assert_eq!(spoken, vec!["Narration for v1"]);
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_resets_everything() {
    let h = Harness::new(ScriptedBackend::new());
    h.orchestrator.attach_bus_listeners();
    h.arm(NarrationSlot::Main, "v1", true);
    h.arm(NarrationSlot::QuickCheck, "q1", true);
    assert_eq!(h.bus.listener_count("play"), 1);

    h.orchestrator.cleanup();

    for slot in NarrationSlot::ALL {
        assert!(h.orchestrator.current(slot).is_none());
        assert!(!h.orchestrator.is_playing(slot));
        assert!(!h.orchestrator.has_pending_timer(slot));
    }
    assert_eq!(h.bus.listener_count("play"), 0);
    assert_eq!(h.bus.listener_count("pause"), 0);

    advance(2000).await;
    assert!(h.backend.spoken().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_bus_commands_drive_playback() {
    let h = Harness::new(ScriptedBackend::new());
    h.orchestrator.attach_bus_listeners();
    h.orchestrator.attach_bus_listeners();
    assert_eq!(h.bus.listener_count("play"), 1);

    let mut params = DirectionLineParams::new("q1", StepKind::QuickCheck);
    params.text = Some("Pick one.".to_string());
    h.orchestrator
        .set_current(NarrationSlot::QuickCheck, DirectionLine::new(params));

    h.bus.dispatch("play", json!({"slot": "quick_check"}));
    advance(100).await;
    assert_eq!(h.backend.spoken()[0].text, "Pick one.");
    assert!(h.orchestrator.is_playing(NarrationSlot::QuickCheck));

    h.bus.dispatch("pause", json!({"slot": "quick_check"}));
    assert!(!h.orchestrator.is_playing(NarrationSlot::QuickCheck));

    advance(2000).await;
    assert_eq!(h.event_names(), vec!["started", "paused"]);
    assert_eq!(
        h.events.lock().unwrap()[1].1,
        json!({"slot": "quick_check", "step_id": "q1"})
    );
}

#[tokio::test(start_paused = true)]
async fn test_initialize_for_step() {
    let h = Harness::new(ScriptedBackend::new());

    assert!(h
        .orchestrator
        .initialize_for_step(NarrationSlot::Main, "s1", "   ", "en")
        .is_none());
    assert!(h.orchestrator.current(NarrationSlot::Main).is_none());

    let line = h
        .orchestrator
        .initialize_for_step(NarrationSlot::QuickCheck, "s2", "Drag the pieces.", "de")
        .unwrap();
    assert!(line.is_new);
    assert_eq!(line.audio_path, "/audio/direction-lines/s2/de.mp3");
    assert!(h.orchestrator.has_pending_timer(NarrationSlot::QuickCheck));

    advance(600).await;
    assert_eq!(h.backend.spoken()[0].lang, "de");
}

#[tokio::test(start_paused = true)]
async fn test_dropping_orchestrator_cancels_timers() {
    let h = Harness::new(ScriptedBackend::new());
    h.arm(NarrationSlot::Main, "v1", true);

    let Harness {
        backend,
        orchestrator,
        ..
    } = h;
    drop(orchestrator);

    advance(2000).await;
    assert!(backend.spoken().is_empty());
}

fn pairs(expected: &[(&str, &str)]) -> Vec<(String, String)> {
    expected
        .iter()
        .map(|(name, slot)| (name.to_string(), slot.to_string()))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_explicit_play_disarms_autoplay_timer() {
    let h = Harness::new(ScriptedBackend::new());
    h.arm(NarrationSlot::Main, "v1", true);

    advance(100).await;
    let orchestrator = h.orchestrator.clone();
    tokio::spawn(async move { orchestrator.play(NarrationSlot::Main).await });

    advance(10).await;
    assert!(!h.orchestrator.has_pending_timer(NarrationSlot::Main));

    // Past the point where the armed timer would have fired
    advance(600).await;
    assert_eq!(h.backend.spoken().len(), 1);
    assert!(h.orchestrator.is_playing(NarrationSlot::Main));

    advance(1000).await;
    assert_eq!(h.backend.spoken().len(), 1);
    assert!(!h.orchestrator.is_playing(NarrationSlot::Main));
    assert_eq!(h.event_names(), vec!["started", "completed"]);
}

#[tokio::test(start_paused = true)]
async fn test_play_command_with_autoplay_off_keeps_playing() {
    let h = Harness::new(ScriptedBackend::new());
    h.orchestrator.attach_bus_listeners();
    h.orchestrator.set_autoplay(false);
    h.arm(NarrationSlot::Main, "v1", true);

    h.bus.dispatch("play", json!({"slot": "main"}));

    advance(600).await;
    assert_eq!(h.backend.spoken().len(), 1);
    assert!(h.orchestrator.is_playing(NarrationSlot::Main));

    advance(1000).await;
    assert_eq!(h.event_names(), vec!["started", "completed"]);
}

#[tokio::test(start_paused = true)]
async fn test_pausing_one_slot_stops_the_others_file_without_fallback() {
    let h = Harness::new(
        ScriptedBackend::new()
            .with_file("/audio/direction-lines/q1/en.mp3", MediaScript::ClosesOnPause),
    );
    h.arm(NarrationSlot::QuickCheck, "q1", true);

    advance(600).await;
    assert!(h.orchestrator.is_playing(NarrationSlot::QuickCheck));

    h.orchestrator.pause(NarrationSlot::Main);
    advance(3000).await;

    assert!(h.backend.spoken().is_empty());
    assert!(!h.orchestrator.is_playing(NarrationSlot::QuickCheck));
    assert_eq!(
        h.events_by_slot(),
        pairs(&[
            ("started", "quick_check"),
            ("paused", "main"),
            ("paused", "quick_check"),
        ])
    );
    assert_eq!(
        h.events.lock().unwrap()[2].1,
        json!({"slot": "quick_check", "step_id": "q1"})
    );
}

#[tokio::test(start_paused = true)]
async fn test_pausing_one_slot_during_the_others_speech_is_not_an_error() {
    let h = Harness::new(ScriptedBackend::new());
    h.arm(NarrationSlot::QuickCheck, "q1", true);

    advance(600).await;
    h.orchestrator.pause(NarrationSlot::Main);
    advance(2000).await;

    assert!(!h.orchestrator.is_playing(NarrationSlot::QuickCheck));
    assert_eq!(
        h.events_by_slot(),
        pairs(&[
            ("started", "quick_check"),
            ("paused", "main"),
            ("paused", "quick_check"),
        ])
    );
}

#[tokio::test(start_paused = true)]
async fn test_playing_one_slot_takes_audio_from_the_other() {
    let h = Harness::new(ScriptedBackend::new());
    h.arm(NarrationSlot::QuickCheck, "q1", true);
    advance(600).await;

    let mut params = DirectionLineParams::new("v1", StepKind::VideoStep);
    params.text = Some("Narration for v1".to_string());
    h.orchestrator
        .set_current(NarrationSlot::Main, DirectionLine::new(params));
    let orchestrator = h.orchestrator.clone();
    tokio::spawn(async move { orchestrator.play(NarrationSlot::Main).await });

    advance(2000).await;

    let spoken: Vec<String> = h.backend.spoken().into_iter().map(|u| u.text).collect();
    assert_eq!(spoken, vec!["Narration for q1", "Narration for v1"]);
    assert!(!h.orchestrator.is_playing(NarrationSlot::QuickCheck));
    assert_eq!(
        h.events_by_slot(),
        pairs(&[
            ("started", "quick_check"),
            ("paused", "quick_check"),
            ("started", "main"),
            ("completed", "main"),
        ])
    );
}
