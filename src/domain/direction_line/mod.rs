pub mod entity;
pub mod resolution;

pub use entity::{
    derive_audio_path, DirectionLine, DirectionLineParams, StepKind, AUDIO_PATH_ROOT,
    DEFAULT_LANGUAGE_CODE,
};
pub use resolution::{action_params, diagnostic_params, intro_params};
