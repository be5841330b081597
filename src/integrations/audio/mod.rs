pub mod backend;
pub mod system;

#[cfg(test)]
pub mod scripted;

pub use backend::{
    AudioBackend, MediaEvent, MediaHandle, SpeechEvent, SpeechSynthesizer, Utterance,
};
#[cfg(test)]
pub use backend::MockAudioBackend;
pub use system::SystemBackend;
