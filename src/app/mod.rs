pub mod assistant;
pub mod controller;
pub mod recognition;
pub mod recording;
pub mod synthesis;

#[cfg(test)]
pub(crate) mod testing;

pub use assistant::{
    AssistantCommand, AssistantEvent, AssistantHandle, AssistantPorts, TranscriptSource,
    VoiceAssistant,
};
pub use controller::AppController;
pub use recognition::RecognitionController;
pub use recording::RecordingController;
pub use synthesis::SpeechQueue;
