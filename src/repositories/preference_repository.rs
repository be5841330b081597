// src/repositories/preference_repository.rs
//
// Preference Repository
//
// Stores the learner's boolean toggles (autoplay) outside the session.
// Dumb storage: no defaults, no events.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{AppError, AppResult};

/// Key under which the autoplay toggle is persisted
pub const AUTOPLAY_KEY: &str = "autoplay";

pub trait PreferenceRepository: Send + Sync {
    fn get_bool(&self, key: &str) -> AppResult<Option<bool>>;
    fn set_bool(&self, key: &str, value: bool) -> AppResult<()>;
}

/// Preferences kept in a single JSON object on disk
pub struct JsonFilePreferenceRepository {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFilePreferenceRepository {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// `<config dir>/lessonflow/preferences.json`
    pub fn default_location() -> AppResult<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| AppError::Preferences("no config directory on this system".into()))?;
        Ok(Self::new(dir.join("lessonflow").join("preferences.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> AppResult<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(map) => Ok(map),
            _ => Err(AppError::Preferences(format!(
                "{} does not contain a JSON object",
                self.path.display()
            ))),
        }
    }
}

impl PreferenceRepository for JsonFilePreferenceRepository {
    fn get_bool(&self, key: &str) -> AppResult<Option<bool>> {
        Ok(self.read_all()?.get(key).and_then(Value::as_bool))
    }

    fn set_bool(&self, key: &str, value: bool) -> AppResult<()> {
        let _guard = self.write_lock.lock().unwrap();
        let mut all = self.read_all()?;
        all.insert(key.to_string(), Value::Bool(value));

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&Value::Object(all))?)?;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPreferenceRepository {
    values: Mutex<HashMap<String, bool>>,
}

impl InMemoryPreferenceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceRepository for InMemoryPreferenceRepository {
    fn get_bool(&self, key: &str) -> AppResult<Option<bool>> {
        Ok(self.values.lock().unwrap().get(key).copied())
    }

    fn set_bool(&self, key: &str, value: bool) -> AppResult<()> {
        self.values.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }
}
