use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{AudioBuffer, DomainError};

/// Per-request transcription settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeConfig {
    /// Language identifier of the active profile (`hi`, `ta`, ...).
    /// `None` lets the service detect it.
    pub language: Option<String>,
    /// Backend model name.
    pub model: String,
    /// Sampling temperature; low values favour accuracy.
    pub temperature: f32,
}

impl Default for TranscribeConfig {
    fn default() -> Self {
        Self {
            language: None,
            model: "whisper-1".to_string(),
            temperature: 0.1,
        }
    }
}

/// Text recovered from a recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub text: String,
    /// Language the audio was transcribed as.
    pub language: Option<String>,
    /// Wall-clock time of the request in milliseconds.
    pub duration_ms: u64,
    /// SHA-256 of the uploaded audio, hex encoded.
    pub audio_digest: String,
}

/// Port for batch transcription of recorded audio.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Turn a finished recording into text.
    async fn transcribe(
        &self,
        audio: &AudioBuffer,
        config: &TranscribeConfig,
    ) -> Result<TranscriptionResult, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcribe_config_default() {
        let config = TranscribeConfig::default();
        assert!(config.language.is_none());
        assert_eq!(config.model, "whisper-1");
        assert!((config.temperature - 0.1).abs() < f32::EPSILON);
    }
}
