use serde::{Deserialize, Serialize};

pub const INTRO_SCREEN: &str = "intro";
pub const PLAYER_SCREEN: &str = "player";
pub const DIAGNOSTIC_SCREEN: &str = "diagnostic";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    pub id: String,
    pub name: String,
}

impl Screen {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Coarse navigation between the lesson's screens
#[derive(Debug, Clone, Default)]
pub struct ScreenSequencer {
    screens: Vec<Screen>,
    current_screen: Option<String>,
}

impl ScreenSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intro, player and diagnostic, starting on the intro
    pub fn lesson() -> Self {
        let mut sequencer = Self::new();
        sequencer.add_screens(vec![
            Screen::new(INTRO_SCREEN, "Introduction"),
            Screen::new(PLAYER_SCREEN, "Player"),
            Screen::new(DIAGNOSTIC_SCREEN, "Diagnostic"),
        ]);
        sequencer.go_to_screen(INTRO_SCREEN);
        sequencer
    }

    pub fn add_screen(&mut self, screen: Screen) {
        self.screens.push(screen);
    }

    pub fn add_screens(&mut self, screens: impl IntoIterator<Item = Screen>) {
        self.screens.extend(screens);
    }

    pub fn screens(&self) -> &[Screen] {
        &self.screens
    }

    pub fn current_screen(&self) -> Option<&Screen> {
        let id = self.current_screen.as_deref()?;
        self.screens.iter().find(|screen| screen.id == id)
    }

    /// Returns whether the screen exists (and is now current)
    pub fn go_to_screen(&mut self, id: &str) -> bool {
        if !self.screens.iter().any(|screen| screen.id == id) {
            log::warn!("Unknown screen '{}'", id);
            return false;
        }
        self.current_screen = Some(id.to_string());
        true
    }

    /// Returns whether the current screen changed
    pub fn go_to_next_screen(&mut self) -> bool {
        let Some(current) = self.current_screen.as_deref() else {
            return false;
        };
        let Some(index) = self.screens.iter().position(|screen| screen.id == current) else {
            return false;
        };
        match self.screens.get(index + 1) {
            Some(next) => {
                self.current_screen = Some(next.id.clone());
                true
            }
            None => false,
        }
    }
}
