use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AppError, AppResult};

/// A loaded lesson: the videos to watch, the quick checks between them,
/// and the closing diagnostic.
///
/// Immutable for the lifetime of a session. Reloading replaces the whole value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityInfo {
    #[serde(default)]
    pub topic: String,

    #[serde(default)]
    pub sub_topic: String,

    #[serde(default)]
    pub title: String,

    /// Narration for the intro screen
    #[serde(default)]
    pub direction_line_text: Option<String>,

    /// Video items, in playback order
    #[serde(default, rename = "reference")]
    pub references: Vec<Reference>,

    /// Comprehension checks, in playback order
    #[serde(default)]
    pub quick_checks: Vec<QuickCheck>,

    #[serde(default)]
    pub diagnostic: Diagnostic,
}

/// One video segment of the lesson
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    /// Path or URL of the video itself
    #[serde(default)]
    pub media_path: Option<String>,

    #[serde(default)]
    pub direction_line_text: Option<String>,

    /// Pre-recorded narration, overrides the derived path
    #[serde(default)]
    pub audio_path: Option<String>,

    #[serde(default)]
    pub language_code: Option<String>,
}

/// An interactive check shown between videos
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickCheck {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub question: Option<String>,

    #[serde(default)]
    pub direction_line: Option<QuickCheckDirectionLine>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickCheckDirectionLine {
    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    #[serde(default)]
    pub direction_line_text: Option<String>,

    #[serde(default)]
    pub language: Option<String>,

    /// Percentage of correct answers required to pass (0-100)
    #[serde(default)]
    pub pass_threshold: Option<u32>,

    #[serde(default)]
    pub items: Vec<DiagnosticItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticItem {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub prompt: String,
}

impl ActivityInfo {
    /// Parse an activity payload.
    ///
    /// Any parse failure is wrapped with a description of what was being loaded.
    pub fn from_json(payload: &str) -> AppResult<Self> {
        serde_json::from_str(payload).map_err(|e| {
            AppError::MalformedActivity(format!(
                "could not parse activity (line {}, column {}): {}",
                e.line(),
                e.column(),
                e
            ))
        })
    }

    /// Read and parse an activity file
    pub fn load(path: &Path) -> AppResult<Self> {
        let payload = std::fs::read_to_string(path).map_err(|e| {
            AppError::MalformedActivity(format!("could not read {}: {}", path.display(), e))
        })?;
        Self::from_json(&payload)
    }
}

impl QuickCheck {
    /// Direction-line text nested under the quick check, if any
    pub fn direction_line_text(&self) -> Option<&str> {
        self.direction_line
            .as_ref()
            .and_then(|dl| dl.text.as_deref())
    }

    pub fn direction_line_language(&self) -> Option<&str> {
        self.direction_line
            .as_ref()
            .and_then(|dl| dl.language_code.as_deref())
    }
}
