// src/repositories/mod.rs
//
// Repository layer
//
// CRITICAL RULES:
// - Repositories are DUMB storage
// - NO business logic
// - NO defaults (callers decide what a missing value means)
// - NO event emission

pub mod preference_repository;

pub use preference_repository::{
    InMemoryPreferenceRepository, JsonFilePreferenceRepository, PreferenceRepository,
    AUTOPLAY_KEY,
};
