use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::integrations::audio::AudioBackend;

pub const DEFAULT_LANGUAGE_CODE: &str = "en";
pub const AUDIO_PATH_ROOT: &str = "/audio/direction-lines";

/// Kind of step a direction line narrates. Selects the fallback text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    VideoStep,
    VideoIntro,
    InteractiveStep,
    QuickCheck,
    QuizStep,
    Diagnostic,
    Other(String),
}

impl StepKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "video_step" => StepKind::VideoStep,
            "video_intro" => StepKind::VideoIntro,
            "interactive_step" => StepKind::InteractiveStep,
            "quick_check" => StepKind::QuickCheck,
            "quiz_step" => StepKind::QuizStep,
            "diagnostic" => StepKind::Diagnostic,
            other => StepKind::Other(other.to_string()),
        }
    }

    pub fn default_text(&self) -> Option<&'static str> {
        match self {
            StepKind::VideoStep | StepKind::VideoIntro => Some("Watch the video and follow along."),
            StepKind::InteractiveStep | StepKind::QuickCheck => {
                Some("Complete the interactive activity.")
            }
            StepKind::QuizStep => Some("Answer the questions."),
            StepKind::Diagnostic => Some("Answer the questions to test your understanding."),
            StepKind::Other(_) => None,
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepKind::VideoStep => write!(f, "video_step"),
            StepKind::VideoIntro => write!(f, "video_intro"),
            StepKind::InteractiveStep => write!(f, "interactive_step"),
            StepKind::QuickCheck => write!(f, "quick_check"),
            StepKind::QuizStep => write!(f, "quiz_step"),
            StepKind::Diagnostic => write!(f, "diagnostic"),
            StepKind::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Construction input for a [`DirectionLine`]
#[derive(Debug, Clone)]
pub struct DirectionLineParams {
    pub audio_path: Option<String>,
    pub is_new: bool,
    pub name: StepKind,
    pub text: Option<String>,
    pub step_id: String,
    pub language_code: Option<String>,
}

impl DirectionLineParams {
    pub fn new(step_id: impl Into<String>, name: StepKind) -> Self {
        Self {
            audio_path: None,
            is_new: false,
            name,
            text: None,
            step_id: step_id.into(),
            language_code: None,
        }
    }
}

/// The spoken instruction for one step.
///
/// Built fresh on every phase/action change and replaced rather than mutated.
/// The only interior state is the `audio_generated` marker, which is set once
/// and never cleared.
#[derive(Debug)]
pub struct DirectionLine {
    /// Instance identity, distinguishes two lines built for the same step
    pub id: Uuid,
    pub step_id: String,
    pub name: StepKind,
    pub text: String,
    pub language_code: String,
    pub audio_path: String,
    pub is_new: bool,
    audio_generated: AtomicBool,
}

impl DirectionLine {
    pub fn new(params: DirectionLineParams) -> Self {
        let language_code = params
            .language_code
            .filter(|code| !code.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE_CODE.to_string());

        let text = match params.text {
            Some(text) if !text.trim().is_empty() => text,
            _ => match params.name.default_text() {
                Some(default) => default.to_string(),
                None => {
                    log::warn!(
                        "No default direction line for step kind '{}' (step '{}')",
                        params.name,
                        params.step_id
                    );
                    String::new()
                }
            },
        };

        let audio_path = match params.audio_path {
            Some(path) if !path.is_empty() => path,
            _ => derive_audio_path(&params.step_id, &language_code),
        };

        Self {
            id: Uuid::new_v4(),
            step_id: params.step_id,
            name: params.name,
            text,
            language_code,
            audio_path,
            is_new: params.is_new,
            audio_generated: AtomicBool::new(false),
        }
    }

    pub fn audio_generated(&self) -> bool {
        self.audio_generated.load(Ordering::SeqCst)
    }

    /// Check whether the recorded audio exists. Failures count as "no".
    pub async fn check_audio_availability(&self, backend: &dyn AudioBackend) -> bool {
        if self.audio_path.is_empty() {
            return false;
        }
        match backend.resource_exists(&self.audio_path).await {
            Ok(exists) => exists,
            Err(e) => {
                log::warn!(
                    "Audio availability check failed for {}: {}",
                    self.audio_path,
                    e
                );
                false
            }
        }
    }

    /// Returns true when recorded audio can be played, false when the caller
    /// should fall back to TTS.
    ///
    /// A negative answer is not cached: the next call checks again.
    pub async fn generate_audio_if_needed(&self, backend: &dyn AudioBackend) -> bool {
        if self.audio_generated() {
            return true;
        }
        if self.check_audio_availability(backend).await {
            self.audio_generated.store(true, Ordering::SeqCst);
            return true;
        }
        log::debug!(
            "No recorded audio for step '{}', TTS will be used",
            self.step_id
        );
        false
    }
}

/// `/audio/direction-lines/{step_id}/{language_code}.mp3`, or empty without a step id
pub fn derive_audio_path(step_id: &str, language_code: &str) -> String {
    if step_id.is_empty() {
        return String::new();
    }
    format!("{}/{}/{}.mp3", AUDIO_PATH_ROOT, step_id, language_code)
}
