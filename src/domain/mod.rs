pub mod audio;
pub mod config;
pub mod error;
pub mod intent;
pub mod language;
pub mod microphone;
pub mod recognition;
pub mod recording;
pub mod utterance;
pub mod voice;

pub use audio::{AudioBuffer, AudioChunk, CaptureConstraints};
pub use config::AppConfig;
pub use error::DomainError;
pub use intent::match_command;
pub use language::{
    CommandKind, CommandLexicon, LanguageCatalog, LanguageProfile, ResponseKind, VoiceMode,
};
pub use microphone::{MicrophoneArbiter, MicrophoneHolder, MicrophoneLease};
pub use recognition::{
    RecognitionEffect, RecognitionErrorCode, RecognitionEvent, RecognitionPhase,
    RecognitionSession,
};
pub use recording::{RecordingPhase, RecordingSession};
pub use utterance::{Prosody, SynthesisEvent, UtteranceId, UtteranceRequest};
pub use voice::{
    SelectionTier, VoiceDescriptor, VoiceFallbackPolicy, VoiceHandle, VoiceResolver,
    VoiceSelection,
};
