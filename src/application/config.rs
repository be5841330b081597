// src/application/config.rs
//
// Narration configuration. Every field has a default, so a partial (or
// absent) config file is fine.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    /// Delay between arming a direction line and autoplaying it
    pub autoplay_delay_ms: u64,
    /// Speech rate for synthesized narration, 1.0 is normal speed
    pub tts_rate: f32,
    pub default_language: String,
    /// Prefix for relative audio paths (HEAD checks and playback)
    pub audio_base_url: String,
    /// Executable used for file playback
    pub media_command: String,
    /// Executable used for speech synthesis
    pub speech_command: String,
    /// Speech synthesizer speed at rate 1.0
    pub words_per_minute: u32,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            autoplay_delay_ms: 500,
            tts_rate: 0.9,
            default_language: "en".to_string(),
            audio_base_url: "http://localhost:8080".to_string(),
            media_command: "mpv".to_string(),
            speech_command: "espeak-ng".to_string(),
            words_per_minute: 175,
        }
    }
}

impl NarrationConfig {
    pub fn load(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn autoplay_delay(&self) -> Duration {
        Duration::from_millis(self.autoplay_delay_ms)
    }
}
