// src/integrations/audio/system.rs
//
// Platform audio backend
//
// ARCHITECTURE:
// - Existence checks: HTTP HEAD through reqwest
// - File playback: one `mpv` process per media handle
// - Speech: one `espeak-ng` process per utterance
// - Stopping kills the child process; no IPC
//
// CRITICAL RULES:
// - This is INFRASTRUCTURE: it reports events, it never touches narration state
// - A killed child reports nothing; the caller's epoch check handles staleness

use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};

use super::backend::{
    AudioBackend, MediaEvent, MediaHandle, SpeechEvent, SpeechSynthesizer, Utterance,
};
use crate::application::NarrationConfig;
use crate::error::{AppError, AppResult};

const HEAD_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SystemBackend {
    client: Client,
    config: NarrationConfig,
    speech: Option<Arc<ProcessSpeech>>,
}

impl SystemBackend {
    pub fn new(config: NarrationConfig) -> AppResult<Self> {
        let client = Client::builder().timeout(HEAD_TIMEOUT).build()?;

        let speech = match find_executable(&config.speech_command) {
            Some(program) => Some(Arc::new(ProcessSpeech::new(
                program,
                config.words_per_minute,
            ))),
            None => {
                log::warn!(
                    "Speech command '{}' not found, narration falls back to silence",
                    config.speech_command
                );
                None
            }
        };

        Ok(Self {
            client,
            config,
            speech,
        })
    }

    /// Absolute URLs pass through, relative paths hang off `audio_base_url`
    pub fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.config.audio_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl AudioBackend for SystemBackend {
    async fn resource_exists(&self, path: &str) -> AppResult<bool> {
        let url = self.resolve_url(path);
        let response = self.client.head(&url).send().await?;
        log::debug!("HEAD {} -> {}", url, response.status());
        Ok(response.status().is_success())
    }

    fn open_media(&self, path: &str) -> AppResult<Arc<dyn MediaHandle>> {
        let program = find_executable(&self.config.media_command).ok_or_else(|| {
            AppError::AudioPlayback(format!(
                "media command '{}' not found",
                self.config.media_command
            ))
        })?;
        Ok(Arc::new(ProcessMedia::new(program, self.resolve_url(path))))
    }

    fn speech(&self) -> Option<Arc<dyn SpeechSynthesizer>> {
        self.speech
            .clone()
            .map(|speech| speech as Arc<dyn SpeechSynthesizer>)
    }
}

/// Media handle backed by an `mpv` child process
pub struct ProcessMedia {
    program: PathBuf,
    url: String,
    listeners: Arc<Mutex<Vec<mpsc::UnboundedSender<MediaEvent>>>>,
    stop: Mutex<Option<oneshot::Sender<()>>>,
}

impl ProcessMedia {
    fn new(program: PathBuf, url: String) -> Self {
        Self {
            program,
            url,
            listeners: Arc::new(Mutex::new(Vec::new())),
            stop: Mutex::new(None),
        }
    }
}

fn broadcast(listeners: &Mutex<Vec<mpsc::UnboundedSender<MediaEvent>>>, event: MediaEvent) {
    let mut listeners = listeners.lock().unwrap();
    listeners.retain(|tx| tx.send(event.clone()).is_ok());
}

#[async_trait]
impl MediaHandle for ProcessMedia {
    fn path(&self) -> &str {
        &self.url
    }

    // mpv buffers on its own; there is nothing to wait for before spawning it
    fn can_play_through(&self) -> bool {
        true
    }

    fn events(&self) -> mpsc::UnboundedReceiver<MediaEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.lock().unwrap().push(tx);
        rx
    }

    async fn play(&self) -> AppResult<()> {
        let mut child = Command::new(&self.program)
            .arg("--no-video")
            .arg("--no-terminal")
            .arg("--really-quiet")
            .arg(&self.url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AppError::AudioPlayback(format!("failed to launch {:?}: {}", self.program, e))
            })?;

        let (stop_tx, stop_rx) = oneshot::channel();
        *self.stop.lock().unwrap() = Some(stop_tx);

        broadcast(&self.listeners, MediaEvent::Playing);

        let listeners = Arc::clone(&self.listeners);
        let url = self.url.clone();
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    let event = match status {
                        Ok(status) if status.success() => MediaEvent::Ended,
                        Ok(status) => MediaEvent::Error(format!("player exited with {}", status)),
                        Err(e) => MediaEvent::Error(e.to_string()),
                    };
                    broadcast(&listeners, event);
                }
                _ = stop_rx => {
                    let _ = child.kill().await;
                    log::debug!("Stopped playback of {}", url);
                }
            }
            // Dropping the senders closes every listener channel
            listeners.lock().unwrap().clear();
        });

        Ok(())
    }

    fn pause(&self) {
        if let Some(stop) = self.stop.lock().unwrap().take() {
            let _ = stop.send(());
        }
    }

    // A new `play` always restarts from the beginning
    fn rewind(&self) {}
}

/// Speech synthesizer backed by `espeak-ng` child processes.
/// Only one utterance runs at a time.
pub struct ProcessSpeech {
    program: PathBuf,
    words_per_minute: u32,
    current: Mutex<Option<oneshot::Sender<()>>>,
}

impl ProcessSpeech {
    fn new(program: PathBuf, words_per_minute: u32) -> Self {
        Self {
            program,
            words_per_minute,
            current: Mutex::new(None),
        }
    }
}

impl SpeechSynthesizer for ProcessSpeech {
    fn cancel(&self) {
        if let Some(cancel) = self.current.lock().unwrap().take() {
            let _ = cancel.send(());
        }
    }

    fn speak(&self, utterance: Utterance) -> mpsc::UnboundedReceiver<SpeechEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        *self.current.lock().unwrap() = Some(cancel_tx);

        let speed = ((self.words_per_minute as f32) * utterance.rate).round() as u32;
        let spawned = Command::new(&self.program)
            .arg("-v")
            .arg(&utterance.lang)
            .arg("-s")
            .arg(speed.to_string())
            .arg(&utterance.text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let _ = tx.send(SpeechEvent::Error(format!(
                    "failed to launch {:?}: {}",
                    self.program, e
                )));
                return rx;
            }
        };

        let _ = tx.send(SpeechEvent::Start);
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    let event = match status {
                        Ok(status) if status.success() => SpeechEvent::End,
                        Ok(status) => SpeechEvent::Error(format!("synthesizer exited with {}", status)),
                        Err(e) => SpeechEvent::Error(e.to_string()),
                    };
                    let _ = tx.send(event);
                }
                _ = cancel_rx => {
                    let _ = child.kill().await;
                    let _ = tx.send(SpeechEvent::Error("interrupted".to_string()));
                }
            }
        });

        rx
    }
}

/// Resolve a command name against PATH (or accept an existing path as-is)
fn find_executable(command: &str) -> Option<PathBuf> {
    let candidate = Path::new(command);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(command))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_with_base(base: &str) -> SystemBackend {
        let config = NarrationConfig {
            audio_base_url: base.to_string(),
            speech_command: "definitely-not-a-speech-command".to_string(),
            ..Default::default()
        };
        SystemBackend::new(config).unwrap()
    }

    #[test]
    fn test_resolve_relative_path() {
        let backend = backend_with_base("https://cdn.example.org/");
        assert_eq!(
            backend.resolve_url("/audio/direction-lines/abc/en.mp3"),
            "https://cdn.example.org/audio/direction-lines/abc/en.mp3"
        );
    }

    #[test]
    fn test_absolute_url_passes_through() {
        let backend = backend_with_base("https://cdn.example.org");
        assert_eq!(
            backend.resolve_url("https://other.example.org/a.mp3"),
            "https://other.example.org/a.mp3"
        );
    }

    #[test]
    fn test_missing_speech_command_means_no_tts() {
        let backend = backend_with_base("https://cdn.example.org");
        assert!(backend.speech().is_none());
    }

    #[test]
    fn test_missing_media_command_refuses_to_open() {
        let config = NarrationConfig {
            media_command: "definitely-not-a-media-player".to_string(),
            speech_command: "definitely-not-a-speech-command".to_string(),
            ..Default::default()
        };
        let backend = SystemBackend::new(config).unwrap();
        assert!(backend.open_media("/a.mp3").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_an_error() {
        let backend = backend_with_base("http://127.0.0.1:9");
        assert!(backend.resource_exists("/a.mp3").await.is_err());
    }
}
