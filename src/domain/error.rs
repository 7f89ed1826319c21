use crate::domain::microphone::MicrophoneHolder;
use crate::domain::recognition::RecognitionPhase;
use thiserror::Error;

/// Domain-level errors for the voice engine.
///
/// Every error is local to the subsystem that raised it; none of them is
/// meant to take the host application down.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network request blocked: {reason}")]
    NetworkBlocked { reason: String },

    #[error("HTTP request failed: {0}")]
    HttpRequest(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Platform capability not supported: {capability}")]
    CapabilityUnsupported { capability: &'static str },

    #[error("Invalid language profile '{language}': {reason}")]
    InvalidProfile { language: String, reason: String },

    #[error("Recognition session already active")]
    RecognitionAlreadyActive,

    #[error("Microphone is held by the {holder} session")]
    MicrophoneUnavailable { holder: MicrophoneHolder },

    #[error("Microphone permission denied")]
    MicrophonePermissionDenied,

    #[error("Recognition aborted")]
    RecognitionAborted,

    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("Illegal recognition transition: {event} while {phase:?}")]
    IllegalRecognitionTransition {
        phase: RecognitionPhase,
        event: &'static str,
    },

    #[error("No voice available for {locale}")]
    NoVoiceAvailable { locale: String },

    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    #[error("Already recording")]
    RecordingAlreadyActive,

    #[error("No active recording")]
    NoActiveRecording,

    #[error("Audio device error: {message}")]
    AudioDevice { message: String },

    #[error("Transcription network failure: {0}")]
    TranscriptionNetworkFailure(String),

    #[error("Transcription error: {0}")]
    Transcription(String),
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for DomainError {
    fn from(err: toml::de::Error) -> Self {
        DomainError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DomainError {
    fn from(err: toml::ser::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

impl From<hound::Error> for DomainError {
    fn from(err: hound::Error) -> Self {
        DomainError::Transcription(format!("Failed to package audio: {}", err))
    }
}
