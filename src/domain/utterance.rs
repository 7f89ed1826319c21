use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::voice::VoiceDescriptor;

/// Identifies one utterance handed to the synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UtteranceId(pub u64);

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "utterance-{}", self.0)
    }
}

/// Pitch, rate and volume applied to every utterance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prosody {
    pub pitch: f32,
    /// Slightly slower than normal for clarity.
    pub rate: f32,
    pub volume: f32,
}

impl Default for Prosody {
    fn default() -> Self {
        Self {
            pitch: 1.0,
            rate: 0.9,
            volume: 1.0,
        }
    }
}

/// A single unit of speech to be played.
///
/// `voice` is `None` when the platform default voice should be used.
#[derive(Debug, Clone, PartialEq)]
pub struct UtteranceRequest {
    pub id: UtteranceId,
    pub text: String,
    pub locale: String,
    pub voice: Option<VoiceDescriptor>,
    pub prosody: Prosody,
}

/// Notifications delivered by a platform synthesizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SynthesisEvent {
    Started(UtteranceId),
    Ended(UtteranceId),
    Failed { id: UtteranceId, message: String },
    /// The platform voice catalog changed (typically: finished loading).
    VoicesChanged,
}
