// src/application/mod.rs
//
// Application boundary: configuration and the session state handed to the binary

pub mod config;
pub mod state;

pub use config::NarrationConfig;
pub use state::AppState;
