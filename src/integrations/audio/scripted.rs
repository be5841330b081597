// src/integrations/audio/scripted.rs
//
// Deterministic audio backend for tests. Timing runs on tokio's clock, so
// tests using `start_paused = true` control every race explicitly.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use super::backend::{
    AudioBackend, MediaEvent, MediaHandle, SpeechEvent, SpeechSynthesizer, Utterance,
};
use crate::error::{AppError, AppResult};

/// How a scripted media file behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaScript {
    /// Ready immediately, ends after the duration
    PlayThrough,
    /// Becomes ready after `BUFFER_DELAY`, then plays through
    Buffering,
    /// The start request is refused
    RejectStart,
    /// Starts, then reports a decode error after the duration
    FailMidway,
    /// Plays through, but pausing closes every event channel (a killed player process)
    ClosesOnPause,
}

pub const BUFFER_DELAY: Duration = Duration::from_millis(50);

pub struct ScriptedBackend {
    existing: Mutex<HashSet<String>>,
    scripts: Mutex<HashMap<String, MediaScript>>,
    media_duration: Duration,
    head_failure: AtomicBool,
    pub head_checks: AtomicUsize,
    pub opened: Mutex<Vec<Arc<ScriptedMedia>>>,
    pub speech: Option<Arc<ScriptedSpeech>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            existing: Mutex::new(HashSet::new()),
            scripts: Mutex::new(HashMap::new()),
            media_duration: Duration::from_secs(2),
            head_failure: AtomicBool::new(false),
            head_checks: AtomicUsize::new(0),
            opened: Mutex::new(Vec::new()),
            speech: Some(Arc::new(ScriptedSpeech::new(Duration::from_secs(1)))),
        }
    }

    pub fn without_speech(mut self) -> Self {
        self.speech = None;
        self
    }

    pub fn with_file(self, path: &str, script: MediaScript) -> Self {
        self.existing.lock().unwrap().insert(path.to_string());
        self.scripts.lock().unwrap().insert(path.to_string(), script);
        self
    }

    pub fn failing_head_checks(self) -> Self {
        self.head_failure.store(true, Ordering::SeqCst);
        self
    }

    pub fn opened_paths(&self) -> Vec<String> {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .map(|media| media.path.clone())
            .collect()
    }

    pub fn spoken(&self) -> Vec<Utterance> {
        self.speech
            .as_ref()
            .map(|speech| speech.spoken.lock().unwrap().clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AudioBackend for ScriptedBackend {
    async fn resource_exists(&self, path: &str) -> AppResult<bool> {
        self.head_checks.fetch_add(1, Ordering::SeqCst);
        if self.head_failure.load(Ordering::SeqCst) {
            return Err(AppError::Other("network unreachable".to_string()));
        }
        Ok(self.existing.lock().unwrap().contains(path))
    }

    fn open_media(&self, path: &str) -> AppResult<Arc<dyn MediaHandle>> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or(MediaScript::RejectStart);
        let media = Arc::new(ScriptedMedia::new(path, script, self.media_duration));
        self.opened.lock().unwrap().push(Arc::clone(&media));
        Ok(media)
    }

    fn speech(&self) -> Option<Arc<dyn SpeechSynthesizer>> {
        self.speech
            .clone()
            .map(|speech| speech as Arc<dyn SpeechSynthesizer>)
    }
}

pub struct ScriptedMedia {
    pub path: String,
    script: MediaScript,
    duration: Duration,
    listeners: Arc<Mutex<Vec<mpsc::UnboundedSender<MediaEvent>>>>,
    pub paused: AtomicBool,
    pub rewound: AtomicBool,
}

impl ScriptedMedia {
    fn new(path: &str, script: MediaScript, duration: Duration) -> Self {
        Self {
            path: path.to_string(),
            script,
            duration,
            listeners: Arc::new(Mutex::new(Vec::new())),
            paused: AtomicBool::new(false),
            rewound: AtomicBool::new(false),
        }
    }

    fn emit_later(&self, delay: Duration, event: MediaEvent) {
        let listeners = Arc::clone(&self.listeners);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            for tx in listeners.lock().unwrap().iter() {
                let _ = tx.send(event.clone());
            }
        });
    }
}

#[async_trait]
impl MediaHandle for ScriptedMedia {
    fn path(&self) -> &str {
        &self.path
    }

    fn can_play_through(&self) -> bool {
        self.script != MediaScript::Buffering
    }

    fn events(&self) -> mpsc::UnboundedReceiver<MediaEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.lock().unwrap().push(tx);
        if self.script == MediaScript::Buffering {
            self.emit_later(BUFFER_DELAY, MediaEvent::CanPlayThrough);
        }
        rx
    }

    async fn play(&self) -> AppResult<()> {
        match self.script {
            MediaScript::RejectStart => Err(AppError::AudioPlayback(
                "play() request was refused".to_string(),
            )),
            MediaScript::FailMidway => {
                self.emit_later(Duration::ZERO, MediaEvent::Playing);
                self.emit_later(self.duration, MediaEvent::Error("decode error".to_string()));
                Ok(())
            }
            MediaScript::PlayThrough | MediaScript::Buffering | MediaScript::ClosesOnPause => {
                self.emit_later(Duration::ZERO, MediaEvent::Playing);
                // Like a real element, a pause does not retract an already queued "ended"
                self.emit_later(self.duration, MediaEvent::Ended);
                Ok(())
            }
        }
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        if self.script == MediaScript::ClosesOnPause {
            self.listeners.lock().unwrap().clear();
        }
    }

    fn rewind(&self) {
        self.rewound.store(true, Ordering::SeqCst);
    }
}

pub struct ScriptedSpeech {
    duration: Duration,
    cancel_epoch: Arc<AtomicU64>,
    fail: AtomicBool,
    pub cancels: AtomicUsize,
    pub spoken: Mutex<Vec<Utterance>>,
}

impl ScriptedSpeech {
    fn new(duration: Duration) -> Self {
        Self {
            duration,
            cancel_epoch: Arc::new(AtomicU64::new(0)),
            fail: AtomicBool::new(false),
            cancels: AtomicUsize::new(0),
            spoken: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_utterances(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

impl SpeechSynthesizer for ScriptedSpeech {
    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.cancel_epoch.fetch_add(1, Ordering::SeqCst);
    }

    fn speak(&self, utterance: Utterance) -> mpsc::UnboundedReceiver<SpeechEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.spoken.lock().unwrap().push(utterance);

        let epoch = self.cancel_epoch.load(Ordering::SeqCst);
        let cancel_epoch = Arc::clone(&self.cancel_epoch);
        let fail = self.fail.load(Ordering::SeqCst);
        let duration = self.duration;

        tokio::spawn(async move {
            let _ = tx.send(SpeechEvent::Start);
            tokio::time::sleep(duration).await;
            let event = if cancel_epoch.load(Ordering::SeqCst) != epoch {
                SpeechEvent::Error("interrupted".to_string())
            } else if fail {
                SpeechEvent::Error("synthesis-failed".to_string())
            } else {
                SpeechEvent::End
            };
            let _ = tx.send(event);
        });

        rx
    }
}
