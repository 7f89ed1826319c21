use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::microphone::MicrophoneLease;
use crate::domain::DomainError;

/// Recognition session state machine.
///
/// State transitions:
/// - Idle -> Starting (begin)
/// - Starting -> Listening (platform confirmed start)
/// - Starting | Listening -> Stopping (request_stop)
/// - Starting | Listening | Stopping -> Errored (platform error)
/// - any non-Idle phase -> Idle (platform end)
///
/// Errors never restart the session. The platform always follows an error
/// with an end notification, which returns the session to Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecognitionPhase {
    #[default]
    Idle,
    Starting,
    Listening,
    Stopping,
    Errored,
}

impl RecognitionPhase {
    /// A session exists in every phase except Idle.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self, RecognitionPhase::Idle)
    }

    #[must_use]
    pub fn can_stop(&self) -> bool {
        matches!(self, RecognitionPhase::Starting | RecognitionPhase::Listening)
    }
}

/// Error codes reported by platform recognizers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecognitionErrorCode {
    NoSpeech,
    Aborted,
    AudioCapture,
    Network,
    NotAllowed,
    ServiceNotAllowed,
    BadGrammar,
    LanguageNotSupported,
    Other(String),
}

impl RecognitionErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            RecognitionErrorCode::NoSpeech => "no-speech",
            RecognitionErrorCode::Aborted => "aborted",
            RecognitionErrorCode::AudioCapture => "audio-capture",
            RecognitionErrorCode::Network => "network",
            RecognitionErrorCode::NotAllowed => "not-allowed",
            RecognitionErrorCode::ServiceNotAllowed => "service-not-allowed",
            RecognitionErrorCode::BadGrammar => "bad-grammar",
            RecognitionErrorCode::LanguageNotSupported => "language-not-supported",
            RecognitionErrorCode::Other(code) => code,
        }
    }

    /// Map the code onto the engine's error kinds.
    pub fn to_error(&self) -> DomainError {
        match self {
            RecognitionErrorCode::NotAllowed | RecognitionErrorCode::ServiceNotAllowed => {
                DomainError::MicrophonePermissionDenied
            }
            RecognitionErrorCode::Aborted => DomainError::RecognitionAborted,
            other => DomainError::Recognition(other.as_str().to_string()),
        }
    }
}

impl FromStr for RecognitionErrorCode {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "no-speech" => RecognitionErrorCode::NoSpeech,
            "aborted" => RecognitionErrorCode::Aborted,
            "audio-capture" => RecognitionErrorCode::AudioCapture,
            "network" => RecognitionErrorCode::Network,
            "not-allowed" => RecognitionErrorCode::NotAllowed,
            "service-not-allowed" => RecognitionErrorCode::ServiceNotAllowed,
            "bad-grammar" => RecognitionErrorCode::BadGrammar,
            "language-not-supported" => RecognitionErrorCode::LanguageNotSupported,
            other => RecognitionErrorCode::Other(other.to_string()),
        })
    }
}

impl fmt::Display for RecognitionErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notifications delivered by a platform recognizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RecognitionEvent {
    Started,
    Result { transcript: String, is_final: bool },
    Error(RecognitionErrorCode),
    Ended,
}

impl RecognitionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RecognitionEvent::Started => "started",
            RecognitionEvent::Result { .. } => "result",
            RecognitionEvent::Error(_) => "error",
            RecognitionEvent::Ended => "ended",
        }
    }
}

/// What a successfully applied event means to the owner of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEffect {
    /// The platform confirmed it is listening.
    Activated,
    /// A finalized transcript to run through the command pipeline.
    Transcript(String),
    /// The session failed; it stays Errored until the platform ends it.
    Failed(RecognitionErrorCode),
    /// The session is over and the microphone has been released.
    Ended { previous: RecognitionPhase },
    /// Legal but without consequence (interim result, duplicate error).
    Ignored,
}

/// The single live recognition session.
///
/// All mutation goes through [`begin`](Self::begin),
/// [`request_stop`](Self::request_stop) and [`apply`](Self::apply), which
/// reject transitions the state machine does not define.
#[derive(Debug, Default)]
pub struct RecognitionSession {
    phase: RecognitionPhase,
    locale: Option<String>,
    last_error: Option<RecognitionErrorCode>,
    lease: Option<MicrophoneLease>,
}

impl RecognitionSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> RecognitionPhase {
        self.phase
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    pub fn last_error(&self) -> Option<&RecognitionErrorCode> {
        self.last_error.as_ref()
    }

    pub fn holds_microphone(&self) -> bool {
        self.lease.is_some()
    }

    /// Idle -> Starting, taking ownership of the microphone lease.
    pub fn begin(&mut self, locale: &str, lease: MicrophoneLease) -> Result<(), DomainError> {
        if self.phase.is_active() {
            return Err(DomainError::RecognitionAlreadyActive);
        }
        self.set_phase(RecognitionPhase::Starting);
        self.locale = Some(locale.to_string());
        self.last_error = None;
        self.lease = Some(lease);
        Ok(())
    }

    /// Starting | Listening -> Stopping.
    ///
    /// Returns false without changing anything from any other phase; an
    /// Errored session is already on its way to Idle.
    pub fn request_stop(&mut self) -> bool {
        if !self.phase.can_stop() {
            return false;
        }
        self.set_phase(RecognitionPhase::Stopping);
        true
    }

    /// Apply a platform notification.
    pub fn apply(&mut self, event: &RecognitionEvent) -> Result<RecognitionEffect, DomainError> {
        use RecognitionPhase::*;

        let effect = match (self.phase, event) {
            (Starting, RecognitionEvent::Started) => {
                self.set_phase(Listening);
                RecognitionEffect::Activated
            }
            // Stop requested before the platform confirmed the start
            (Stopping, RecognitionEvent::Started) => RecognitionEffect::Ignored,

            (Listening | Stopping, RecognitionEvent::Result { transcript, is_final }) => {
                if *is_final && !transcript.trim().is_empty() {
                    RecognitionEffect::Transcript(transcript.trim().to_string())
                } else {
                    RecognitionEffect::Ignored
                }
            }
            (Errored, RecognitionEvent::Result { .. }) => RecognitionEffect::Ignored,

            (Starting | Listening | Stopping, RecognitionEvent::Error(code)) => {
                self.set_phase(Errored);
                self.last_error = Some(code.clone());
                RecognitionEffect::Failed(code.clone())
            }
            (Errored, RecognitionEvent::Error(_)) => RecognitionEffect::Ignored,

            (previous @ (Starting | Listening | Stopping | Errored), RecognitionEvent::Ended) => {
                self.set_phase(Idle);
                self.locale = None;
                self.lease = None;
                RecognitionEffect::Ended { previous }
            }

            (phase, event) => {
                return Err(DomainError::IllegalRecognitionTransition {
                    phase,
                    event: event.name(),
                })
            }
        };
        Ok(effect)
    }

    fn set_phase(&mut self, next: RecognitionPhase) {
        debug!(from = ?self.phase, to = ?next, "Recognition phase changed");
        self.phase = next;
    }
}
