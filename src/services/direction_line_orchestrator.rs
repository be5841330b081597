// src/services/direction_line_orchestrator.rs
//
// Direction Line Orchestrator - narration state machine
//
// Two independent slots (main narration and quick-check narration), each:
//
//     Idle --start()--> Armed --timer--> Playing --end/error/pause--> Idle
//
// CRITICAL RULES:
// - At most one armed timer per slot; arming clears the previous one
// - A timer only plays the line it was armed for, and only if it is new
// - Every play/pause bumps the slot's epoch; playback callbacks from an
//   older epoch are ignored (a late "ended" after pause changes nothing)
// - An explicit play disarms the slot's timer
// - Audio output is shared: at most one slot owns it, and stopping it
//   (pause, or another slot claiming it) invalidates the owner's epoch
// - File playback failure retries once with TTS, never more
// - Callbacks never panic outward

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::application::NarrationConfig;
use crate::domain::direction_line::{DirectionLine, DirectionLineParams, StepKind};
use crate::events::{EventBus, Listener, NarrationCommand, NarrationEvent, NarrationNotice};
use crate::services::audio_playback_service::{AudioPlaybackService, PlaybackCallbacks};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrationSlot {
    #[default]
    Main,
    QuickCheck,
}

impl NarrationSlot {
    pub const ALL: [NarrationSlot; 2] = [NarrationSlot::Main, NarrationSlot::QuickCheck];

    fn index(self) -> usize {
        match self {
            NarrationSlot::Main => 0,
            NarrationSlot::QuickCheck => 1,
        }
    }

    /// Step kind used for lines created directly from text
    fn step_kind(self) -> StepKind {
        match self {
            NarrationSlot::Main => StepKind::VideoStep,
            NarrationSlot::QuickCheck => StepKind::QuickCheck,
        }
    }
}

impl std::fmt::Display for NarrationSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NarrationSlot::Main => write!(f, "main"),
            NarrationSlot::QuickCheck => write!(f, "quick_check"),
        }
    }
}

/// Observable state of one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPhase {
    Idle,
    Armed,
    Playing,
}

#[derive(Default)]
struct SlotState {
    current: Option<Arc<DirectionLine>>,
    is_playing: bool,
    pending_timer: Option<JoinHandle<()>>,
    /// Identifies the armed timer; bumped on every arm/clear
    timer_token: u64,
    /// Identifies the playback request allowed to touch this slot
    epoch: u64,
    /// This slot's playback currently owns the shared audio output
    owns_audio: bool,
}

impl SlotState {
    fn clear_timer(&mut self) {
        if let Some(timer) = self.pending_timer.take() {
            timer.abort();
        }
        self.timer_token += 1;
    }
}

struct OrchestratorInner {
    playback: Arc<AudioPlaybackService>,
    event_bus: Arc<EventBus>,
    autoplay_delay: Duration,
    default_language: String,
    autoplay_enabled: AtomicBool,
    slots: Mutex<[SlotState; 2]>,
    bus_listeners: Mutex<Vec<(NarrationEvent, Listener)>>,
}

impl Drop for OrchestratorInner {
    fn drop(&mut self) {
        if let Ok(mut slots) = self.slots.lock() {
            for slot in slots.iter_mut() {
                slot.clear_timer();
            }
        }
    }
}

/// Cheap to clone; clones drive the same slots
#[derive(Clone)]
pub struct DirectionLineOrchestrator {
    inner: Arc<OrchestratorInner>,
}

impl DirectionLineOrchestrator {
    pub fn new(
        playback: Arc<AudioPlaybackService>,
        event_bus: Arc<EventBus>,
        config: &NarrationConfig,
    ) -> Self {
        Self {
            inner: Arc::new(OrchestratorInner {
                playback,
                event_bus,
                autoplay_delay: config.autoplay_delay(),
                default_language: config.default_language.clone(),
                autoplay_enabled: AtomicBool::new(true),
                slots: Mutex::new(Default::default()),
                bus_listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    fn from_weak(weak: &Weak<OrchestratorInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    // ------------------------------------------------------------------------
    // Event bus wiring
    // ------------------------------------------------------------------------

    /// Listen for `play` / `pause` commands on the bus.
    /// Calling it again first detaches the previous listeners.
    pub fn attach_bus_listeners(&self) {
        self.detach_bus_listeners();

        let weak = Arc::downgrade(&self.inner);
        let play = self
            .inner
            .event_bus
            .on(NarrationEvent::Play.as_str(), move |data: &Value| {
                let command = NarrationCommand::from_data(data);
                let Some(orchestrator) = Self::from_weak(&weak) else {
                    return;
                };
                match tokio::runtime::Handle::try_current() {
                    Ok(runtime) => {
                        runtime.spawn(async move { orchestrator.play(command.slot).await });
                    }
                    Err(_) => log::warn!("play command received outside the runtime, ignored"),
                }
            });

        let weak = Arc::downgrade(&self.inner);
        let pause = self
            .inner
            .event_bus
            .on(NarrationEvent::Pause.as_str(), move |data: &Value| {
                let command = NarrationCommand::from_data(data);
                if let Some(orchestrator) = Self::from_weak(&weak) {
                    orchestrator.pause(command.slot);
                }
            });

        let mut listeners = self.inner.bus_listeners.lock().unwrap();
        listeners.push((NarrationEvent::Play, play));
        listeners.push((NarrationEvent::Pause, pause));
    }

    pub fn detach_bus_listeners(&self) {
        let listeners: Vec<(NarrationEvent, Listener)> =
            self.inner.bus_listeners.lock().unwrap().drain(..).collect();
        for (event, listener) in listeners {
            self.inner.event_bus.off(event.as_str(), &listener);
        }
    }

    // ------------------------------------------------------------------------
    // Slot state
    // ------------------------------------------------------------------------

    /// Replace the slot's line. Does not start playback.
    pub fn set_current(&self, slot: NarrationSlot, line: DirectionLine) -> Arc<DirectionLine> {
        let line = Arc::new(line);
        let mut slots = self.inner.slots.lock().unwrap();
        slots[slot.index()].current = Some(Arc::clone(&line));
        log::debug!("[{}] direction line set for step '{}'", slot, line.step_id);
        line
    }

    pub fn current(&self, slot: NarrationSlot) -> Option<Arc<DirectionLine>> {
        self.inner.slots.lock().unwrap()[slot.index()].current.clone()
    }

    pub fn is_playing(&self, slot: NarrationSlot) -> bool {
        self.inner.slots.lock().unwrap()[slot.index()].is_playing
    }

    pub fn has_pending_timer(&self, slot: NarrationSlot) -> bool {
        self.inner.slots.lock().unwrap()[slot.index()]
            .pending_timer
            .is_some()
    }

    pub fn phase(&self, slot: NarrationSlot) -> SlotPhase {
        let slots = self.inner.slots.lock().unwrap();
        let state = &slots[slot.index()];
        if state.pending_timer.is_some() {
            SlotPhase::Armed
        } else if state.is_playing {
            SlotPhase::Playing
        } else {
            SlotPhase::Idle
        }
    }

    /// Language for lines whose content names none
    pub fn default_language(&self) -> &str {
        &self.inner.default_language
    }

    pub fn set_autoplay(&self, enabled: bool) {
        self.inner.autoplay_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn autoplay_enabled(&self) -> bool {
        self.inner.autoplay_enabled.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// Arm the autoplay timer for the slot's current line
    pub fn start(&self, slot: NarrationSlot) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                log::warn!("[{}] cannot arm narration outside the runtime", slot);
                return;
            }
        };

        let mut slots = self.inner.slots.lock().unwrap();
        let state = &mut slots[slot.index()];
        let Some(line) = state.current.clone() else {
            log::warn!("[{}] start requested without a direction line", slot);
            return;
        };

        // Optimistic: "about to play", before any audio is produced
        state.is_playing = true;
        state.clear_timer();
        let token = state.timer_token;

        let weak = Arc::downgrade(&self.inner);
        let delay = self.inner.autoplay_delay;
        state.pending_timer = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(orchestrator) = Self::from_weak(&weak) {
                orchestrator.fire_timer(slot, token, line).await;
            }
        }));

        log::debug!(
            "[{}] armed autoplay for step '{}' in {:?}",
            slot,
            state.current.as_ref().map(|l| l.step_id.as_str()).unwrap_or(""),
            delay
        );
    }

    async fn fire_timer(&self, slot: NarrationSlot, token: u64, armed: Arc<DirectionLine>) {
        {
            let mut slots = self.inner.slots.lock().unwrap();
            let state = &mut slots[slot.index()];
            if state.timer_token != token {
                log::debug!("[{}] superseded timer fired, ignoring", slot);
                return;
            }
            state.pending_timer = None;

            let still_armed = state
                .current
                .as_ref()
                .is_some_and(|current| current.id == armed.id);
            if !still_armed {
                log::debug!(
                    "[{}] line changed since step '{}' was armed, skipping autoplay",
                    slot,
                    armed.step_id
                );
                return;
            }
            if !armed.is_new {
                log::debug!("[{}] step '{}' is not new, skipping autoplay", slot, armed.step_id);
                state.is_playing = false;
                return;
            }
            if !self.autoplay_enabled() {
                log::info!("[{}] autoplay disabled, waiting for play command", slot);
                state.is_playing = false;
                return;
            }
        }

        self.play(slot).await;
    }

    /// Narrate the slot's current line: recorded audio if available, else TTS.
    /// Returns when narration finishes, fails, or is superseded.
    pub async fn play(&self, slot: NarrationSlot) {
        let (line, epoch, restarting) = {
            let mut slots = self.inner.slots.lock().unwrap();
            let state = &mut slots[slot.index()];
            let Some(line) = state.current.clone() else {
                log::warn!("[{}] play requested without a direction line", slot);
                return;
            };
            state.clear_timer();
            let restarting = std::mem::take(&mut state.owns_audio);
            state.epoch += 1;
            state.is_playing = true;
            (line, state.epoch, restarting)
        };

        let playback = Arc::clone(&self.inner.playback);
        if restarting {
            playback.stop_audio();
        }

        let callbacks = self.callbacks(slot, epoch, &line.step_id);

        let recorded = line.generate_audio_if_needed(playback.backend()).await
            && !line.audio_path.is_empty();

        if !self.claim_audio(slot, epoch) {
            log::debug!("[{}] playback of '{}' superseded before start", slot, line.step_id);
            return;
        }

        if recorded {
            log::info!("[{}] playing recorded audio {}", slot, line.audio_path);
            match playback.play_audio_file(&line.audio_path, &callbacks).await {
                Ok(()) => return,
                Err(e) => {
                    if !self.claim_audio(slot, epoch) {
                        log::debug!("[{}] recorded audio stopped: {}", slot, e);
                        return;
                    }
                    log::error!("[{}] recorded audio failed, using TTS: {}", slot, e);
                }
            }
        } else {
            log::info!("[{}] synthesizing narration for '{}'", slot, line.step_id);
        }

        playback
            .play_tts(&line.text, &line.language_code, &callbacks)
            .await;
    }

    /// Stop narration on the slot. Always clears its timer and invalidates any
    /// in-flight playback callbacks. All audio stops, so a slot that was
    /// playing on the other side is invalidated and reported paused too.
    pub fn pause(&self, slot: NarrationSlot) {
        let (step_id, released) = {
            let mut slots = self.inner.slots.lock().unwrap();
            let released = Self::release_audio(&mut slots, slot);
            let state = &mut slots[slot.index()];
            state.is_playing = false;
            state.owns_audio = false;
            state.epoch += 1;
            state.clear_timer();
            (state.current.as_ref().map(|l| l.step_id.clone()), released)
        };

        self.inner.playback.stop_audio();
        log::info!("[{}] narration paused", slot);
        self.notify(NarrationEvent::Paused, NarrationNotice::new(slot, step_id));
        self.announce_released(released);
    }

    /// Pause both slots, forget their lines, and detach from the bus
    pub fn cleanup(&self) {
        for slot in NarrationSlot::ALL {
            self.pause(slot);
        }
        {
            let mut slots = self.inner.slots.lock().unwrap();
            for state in slots.iter_mut() {
                state.current = None;
                state.clear_timer();
            }
        }
        self.detach_bus_listeners();
    }

    /// Narrate free text for a step: builds a fresh, new line and arms it.
    pub fn initialize_for_step(
        &self,
        slot: NarrationSlot,
        step_id: &str,
        text: &str,
        language_code: &str,
    ) -> Option<Arc<DirectionLine>> {
        if text.trim().is_empty() {
            log::warn!("[{}] no direction line text for step '{}'", slot, step_id);
            return None;
        }

        let mut params = DirectionLineParams::new(step_id, slot.step_kind());
        params.text = Some(text.to_string());
        params.language_code = Some(if language_code.is_empty() {
            self.default_language().to_string()
        } else {
            language_code.to_string()
        });
        params.is_new = true;

        let line = self.set_current(slot, DirectionLine::new(params));
        self.start(slot);
        Some(line)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Take the audio output for `epoch` if it still owns the slot.
    /// Whatever another slot was playing is stopped and reported as paused.
    fn claim_audio(&self, slot: NarrationSlot, epoch: u64) -> bool {
        let released = {
            let mut slots = self.inner.slots.lock().unwrap();
            if slots[slot.index()].epoch != epoch {
                return false;
            }
            let released = Self::release_audio(&mut slots, slot);
            slots[slot.index()].owns_audio = true;
            released
        };

        if !released.is_empty() {
            self.inner.playback.stop_audio();
            self.announce_released(released);
        }
        true
    }

    /// Invalidate the playback of every slot except `keep` that owns audio
    fn release_audio(
        slots: &mut [SlotState; 2],
        keep: NarrationSlot,
    ) -> Vec<(NarrationSlot, Option<String>)> {
        NarrationSlot::ALL
            .into_iter()
            .filter(|other| *other != keep)
            .filter_map(|other| {
                let state = &mut slots[other.index()];
                if !state.owns_audio {
                    return None;
                }
                state.owns_audio = false;
                state.is_playing = false;
                state.epoch += 1;
                Some((other, state.current.as_ref().map(|l| l.step_id.clone())))
            })
            .collect()
    }

    fn announce_released(&self, released: Vec<(NarrationSlot, Option<String>)>) {
        for (other, step_id) in released {
            log::info!("[{}] narration stopped by the other slot", other);
            self.notify(NarrationEvent::Paused, NarrationNotice::new(other, step_id));
        }
    }

    /// Apply `update` only if `epoch` still owns the slot
    fn update_if_current(
        weak: &Weak<OrchestratorInner>,
        slot: NarrationSlot,
        epoch: u64,
        update: impl FnOnce(&mut SlotState),
    ) -> Option<Self> {
        let orchestrator = Self::from_weak(weak)?;
        {
            let mut slots = orchestrator.inner.slots.lock().unwrap();
            let state = &mut slots[slot.index()];
            if state.epoch != epoch {
                log::debug!("[{}] ignoring stale playback callback", slot);
                return None;
            }
            update(state);
        }
        Some(orchestrator)
    }

    fn callbacks(&self, slot: NarrationSlot, epoch: u64, step_id: &str) -> PlaybackCallbacks {
        let step_id = step_id.to_string();

        let (weak, step) = (Arc::downgrade(&self.inner), step_id.clone());
        let on_start = move || {
            if let Some(o) = Self::update_if_current(&weak, slot, epoch, |s| s.is_playing = true) {
                log::info!("[{}] narration started for '{}'", slot, step);
                o.notify(
                    NarrationEvent::Started,
                    NarrationNotice::new(slot, Some(step.clone())),
                );
            }
        };

        let (weak, step) = (Arc::downgrade(&self.inner), step_id.clone());
        let on_end = move || {
            if let Some(o) = Self::update_if_current(&weak, slot, epoch, |s| {
                s.is_playing = false;
                s.owns_audio = false;
            }) {
                log::info!("[{}] narration completed for '{}'", slot, step);
                o.notify(
                    NarrationEvent::Completed,
                    NarrationNotice::new(slot, Some(step.clone())),
                );
            }
        };

        let (weak, step) = (Arc::downgrade(&self.inner), step_id);
        let on_error = move |message: &str| {
            if let Some(o) = Self::update_if_current(&weak, slot, epoch, |s| {
                s.is_playing = false;
                s.owns_audio = false;
            }) {
                log::error!("[{}] narration error for '{}': {}", slot, step, message);
                o.notify(
                    NarrationEvent::Error,
                    NarrationNotice::new(slot, Some(step.clone())).with_message(message),
                );
            }
        };

        PlaybackCallbacks::new()
            .on_start(on_start)
            .on_end(on_end)
            .on_error(on_error)
    }

    fn notify(&self, event: NarrationEvent, notice: NarrationNotice) {
        self.inner
            .event_bus
            .dispatch(event.as_str(), notice.to_data());
    }
}
