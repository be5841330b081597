// src/services/audio_playback_service.rs
//
// Audio Playback Service - narration primitives
//
// CRITICAL RULES:
// - Holds no narration state (that is the orchestrator's job)
// - Callbacks are side channels: they never change a call's result
// - TTS never fails outward: unavailable or empty text is a successful no-op
// - Only one utterance at a time: the queue is cancelled before speaking
// - stop_audio() is always safe to call

use regex::Regex;
use std::sync::{Arc, LazyLock, Mutex};

use crate::error::{AppError, AppResult};
use crate::integrations::audio::{
    AudioBackend, MediaEvent, MediaHandle, SpeechEvent, Utterance,
};

pub const DEFAULT_TTS_RATE: f32 = 0.9;

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").unwrap()
});
static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").unwrap());

type Hook = Arc<dyn Fn() + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Lifecycle hooks for one playback request
#[derive(Clone, Default)]
pub struct PlaybackCallbacks {
    on_start: Option<Hook>,
    on_end: Option<Hook>,
    on_error: Option<ErrorHook>,
}

impl PlaybackCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_start = Some(Arc::new(hook));
        self
    }

    pub fn on_end(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_end = Some(Arc::new(hook));
        self
    }

    pub fn on_error(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }

    fn started(&self) {
        if let Some(hook) = &self.on_start {
            guarded("on_start", || hook());
        }
    }

    fn ended(&self) {
        if let Some(hook) = &self.on_end {
            guarded("on_end", || hook());
        }
    }

    fn failed(&self, message: &str) {
        if let Some(hook) = &self.on_error {
            guarded("on_error", || hook(message));
        }
    }
}

/// Run a caller-supplied hook; a panic is logged and swallowed
fn guarded(name: &str, hook: impl FnOnce()) {
    if std::panic::catch_unwind(std::panic::AssertUnwindSafe(hook)).is_err() {
        log::error!("Playback callback {} panicked", name);
    }
}

pub struct AudioPlaybackService {
    backend: Arc<dyn AudioBackend>,
    tts_rate: f32,
    /// Media handles currently playing, stopped together by stop_audio()
    active: Mutex<Vec<Arc<dyn MediaHandle>>>,
}

impl AudioPlaybackService {
    pub fn new(backend: Arc<dyn AudioBackend>, tts_rate: f32) -> Self {
        Self {
            backend,
            tts_rate,
            active: Mutex::new(Vec::new()),
        }
    }

    pub fn backend(&self) -> &dyn AudioBackend {
        self.backend.as_ref()
    }

    /// Play a recorded file to its natural end.
    ///
    /// Waits for the handle to be ready if it is still buffering. Fails on a
    /// media error or if the start request is refused.
    pub async fn play_audio_file(&self, path: &str, callbacks: &PlaybackCallbacks) -> AppResult<()> {
        let handle = match self.backend.open_media(path) {
            Ok(handle) => handle,
            Err(e) => {
                callbacks.failed(&e.to_string());
                return Err(e);
            }
        };

        self.track(&handle);
        let result = drive_media(handle.as_ref(), callbacks).await;
        self.untrack(&handle);

        match &result {
            Ok(()) => log::info!("Finished audio file {}", path),
            Err(e) => {
                log::warn!("Audio file {} failed: {}", path, e);
                callbacks.failed(&e.to_string());
            }
        }
        result
    }

    /// Whether `text` could be spoken right now
    pub fn can_use_tts(&self, text: &str) -> bool {
        !text.is_empty() && self.backend.speech().is_some()
    }

    /// Speak `text` (HTML allowed) in `language_code`.
    ///
    /// Returns once the utterance ends or fails. Without a synthesizer, or with
    /// nothing to say, `on_end` fires immediately.
    pub async fn play_tts(&self, text: &str, language_code: &str, callbacks: &PlaybackCallbacks) {
        let Some(speech) = self.backend.speech() else {
            log::info!("Speech synthesis unavailable, skipping narration");
            callbacks.ended();
            return;
        };

        let plain = extract_text_content(text);
        let plain = plain.trim();
        if plain.is_empty() {
            log::debug!("Nothing to speak");
            callbacks.ended();
            return;
        }

        speech.cancel();
        let mut events = speech.speak(Utterance {
            text: plain.to_string(),
            lang: language_code.to_string(),
            rate: self.tts_rate,
        });

        while let Some(event) = events.recv().await {
            match event {
                SpeechEvent::Start => {
                    log::info!("Speaking narration ({})", language_code);
                    callbacks.started();
                }
                SpeechEvent::End => {
                    callbacks.ended();
                    return;
                }
                SpeechEvent::Error(message) => {
                    log::warn!("Speech synthesis failed: {}", message);
                    callbacks.failed(&message);
                    return;
                }
            }
        }

        log::warn!("Speech synthesizer dropped the utterance");
        callbacks.failed("speech synthesizer closed the utterance");
    }

    /// Try the recorded file first, then TTS. An empty path goes straight to TTS.
    pub async fn play_audio_with_fallback(
        &self,
        path: &str,
        text: &str,
        language_code: &str,
        callbacks: &PlaybackCallbacks,
    ) {
        if !path.is_empty() {
            match self.play_audio_file(path, callbacks).await {
                Ok(()) => return,
                Err(e) => log::info!("Falling back to TTS after file error: {}", e),
            }
        }
        self.play_tts(text, language_code, callbacks).await;
    }

    /// Silence everything: cancel speech, pause and rewind every tracked file
    pub fn stop_audio(&self) {
        if let Some(speech) = self.backend.speech() {
            speech.cancel();
        }

        let handles: Vec<Arc<dyn MediaHandle>> = {
            let mut active = self.active.lock().unwrap();
            active.drain(..).collect()
        };
        for handle in handles {
            log::debug!("Stopping {}", handle.path());
            handle.pause();
            handle.rewind();
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().unwrap().len()
    }

    fn track(&self, handle: &Arc<dyn MediaHandle>) {
        self.active.lock().unwrap().push(Arc::clone(handle));
    }

    fn untrack(&self, handle: &Arc<dyn MediaHandle>) {
        let target = Arc::as_ptr(handle) as *const ();
        self.active
            .lock()
            .unwrap()
            .retain(|h| Arc::as_ptr(h) as *const () != target);
    }
}

async fn drive_media(handle: &dyn MediaHandle, callbacks: &PlaybackCallbacks) -> AppResult<()> {
    let mut events = handle.events();

    if !handle.can_play_through() {
        loop {
            match events.recv().await {
                Some(MediaEvent::CanPlayThrough) => break,
                Some(MediaEvent::Error(message)) => return Err(AppError::AudioPlayback(message)),
                Some(_) => continue,
                None => {
                    return Err(AppError::AudioPlayback(
                        "media closed before it was ready".to_string(),
                    ))
                }
            }
        }
    }

    handle
        .play()
        .await
        .map_err(|e| AppError::AudioPlayback(format!("could not start playback: {}", e)))?;

    while let Some(event) = events.recv().await {
        match event {
            MediaEvent::Playing => callbacks.started(),
            MediaEvent::Ended => {
                callbacks.ended();
                return Ok(());
            }
            MediaEvent::Error(message) => return Err(AppError::AudioPlayback(message)),
            MediaEvent::CanPlayThrough => {}
        }
    }

    Err(AppError::AudioPlayback(
        "media closed before playback ended".to_string(),
    ))
}

/// Rendered plain text of an HTML fragment: markup removed, entities decoded
pub fn extract_text_content(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    let text = SCRIPT_OR_STYLE.replace_all(html, "");
    let text = COMMENT.replace_all(&text, "");
    let text = TAG.replace_all(&text, "");
    ENTITY
        .replace_all(&text, |caps: &regex::Captures| {
            decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn decode_entity(entity: &str) -> Option<String> {
    if let Some(number) = entity.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    let decoded = match entity {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "hellip" => "\u{2026}",
        "rsquo" => "\u{2019}",
        "lsquo" => "\u{2018}",
        "rdquo" => "\u{201d}",
        "ldquo" => "\u{201c}",
        _ => return None,
    };
    Some(decoded.to_string())
}
