pub mod entity;

pub use entity::{Screen, ScreenSequencer, DIAGNOSTIC_SCREEN, INTRO_SCREEN, PLAYER_SCREEN};
