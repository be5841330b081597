// src/integrations/mod.rs
//
// External Integrations Module

pub mod audio;

pub use audio::{AudioBackend, SystemBackend};
