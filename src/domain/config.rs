use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::audio::CaptureConstraints;
use crate::domain::language::{VoiceMode, DEFAULT_LANGUAGE};
use crate::domain::utterance::Prosody;
use crate::domain::voice::VoiceFallbackPolicy;

/// Privacy-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    /// When true, all network requests are blocked (default: true).
    pub local_only: bool,
    /// Allowed domains when local_only is false.
    pub allowed_domains: Vec<String>,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            local_only: true,
            allowed_domains: Self::default_allowed_domains(),
        }
    }
}

impl PrivacyConfig {
    /// Default allowed domains for cloud transcription and synthesis.
    pub fn default_allowed_domains() -> Vec<String> {
        vec![
            "api.openai.com".to_string(),
            "centralindia.tts.speech.microsoft.com".to_string(),
            "centralindia.api.cognitive.microsoft.com".to_string(),
        ]
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Enable file logging with rotation.
    pub file_logging: bool,
    /// Maximum number of log files to keep.
    pub max_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: true,
            max_files: 7,
        }
    }
}

/// Active language and optional extra profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageConfig {
    /// Language identifier, e.g. "hi" or "ta".
    pub active: String,
    /// TOML file of profiles merged over the built-in catalog.
    pub profiles_path: Option<PathBuf>,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            active: DEFAULT_LANGUAGE.to_string(),
            profiles_path: None,
        }
    }
}

/// Parameters passed to the platform recognizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub continuous: bool,
    pub interim_results: bool,
    pub max_alternatives: u32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            continuous: true,
            interim_results: false,
            max_alternatives: 1,
        }
    }
}

/// Microphone capture for the cloud transcription path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub max_duration_secs: u32,
    pub chunk_interval_ms: u32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        let constraints = CaptureConstraints::default();
        Self {
            sample_rate: constraints.sample_rate,
            channels: constraints.channels,
            echo_cancellation: constraints.echo_cancellation,
            noise_suppression: constraints.noise_suppression,
            max_duration_secs: constraints.max_duration_secs,
            chunk_interval_ms: constraints.chunk_interval_ms,
        }
    }
}

impl RecordingConfig {
    pub fn constraints(&self) -> CaptureConstraints {
        CaptureConstraints {
            sample_rate: self.sample_rate,
            channels: self.channels,
            echo_cancellation: self.echo_cancellation,
            noise_suppression: self.noise_suppression,
            chunk_interval_ms: self.chunk_interval_ms,
            max_duration_secs: self.max_duration_secs,
        }
    }
}

/// Cloud transcription and synthesis endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub transcription_url: String,
    pub synthesis_url: String,
    /// Endpoint returning a short-lived `{token, region}` pair.
    pub token_url: Option<String>,
    pub transcription_model: String,
    pub temperature: f32,
    pub voice_mode: VoiceMode,
    /// Output format requested from the synthesis endpoint.
    pub synthesis_format: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            transcription_url: "https://api.openai.com/v1/audio/transcriptions".to_string(),
            synthesis_url: "https://centralindia.tts.speech.microsoft.com/cognitiveservices/v1"
                .to_string(),
            token_url: None,
            transcription_model: "whisper-1".to_string(),
            temperature: 0.1,
            voice_mode: VoiceMode::Normal,
            synthesis_format: "audio-24khz-48kbitrate-mono-mp3".to_string(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub privacy: PrivacyConfig,
    pub logging: LoggingConfig,
    pub language: LanguageConfig,
    pub speech: Prosody,
    pub recognition: RecognitionConfig,
    pub recording: RecordingConfig,
    pub cloud: CloudConfig,
    pub voice_selection: VoiceFallbackPolicy,
}

impl AppConfig {
    /// Create a new AppConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::new();
        assert!(config.privacy.local_only);
        assert_eq!(config.language.active, "en");
        assert!(config.recognition.continuous);
        assert!(!config.recognition.interim_results);
        assert_eq!(config.recognition.max_alternatives, 1);
        assert_eq!(config.speech.rate, 0.9);
        assert_eq!(config.cloud.transcription_model, "whisper-1");
        assert_eq!(config.recording.constraints(), CaptureConstraints::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [language]
            active = "ta"

            [speech]
            rate = 1.1
            "#,
        )
        .unwrap();
        assert_eq!(config.language.active, "ta");
        assert_eq!(config.speech.rate, 1.1);
        assert_eq!(config.speech.pitch, 1.0);
        assert_eq!(config.voice_selection.intermediate_locale, "hi-IN");
    }
}
