use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::domain::config::CloudConfig;
use crate::domain::language::{LanguageCatalog, LanguageProfile, NeuralVoices, VoiceMode};
use crate::domain::{AudioBuffer, DomainError};
use crate::ports::{
    FilePart, HttpClient, MultipartForm, TranscribeConfig, Transcriber, TranscriptionResult,
};

/// Short-lived credentials issued by the token endpoint.
#[derive(Debug, Clone, Deserialize)]
struct SpeechToken {
    token: String,
    region: String,
}

/// Cloud speech-to-text and text-to-speech over the [`HttpClient`] port.
///
/// Every request goes through the injected client, so local-only mode and
/// the domain allow-list apply to the cloud path as well.
pub struct CloudSpeechClient<H: HttpClient> {
    http: Arc<H>,
    config: RwLock<CloudConfig>,
    fallback_voices: Option<NeuralVoices>,
}

impl<H: HttpClient> CloudSpeechClient<H> {
    pub fn new(http: Arc<H>, config: CloudConfig) -> Result<Self, DomainError> {
        let fallback_voices = LanguageCatalog::builtin()?
            .resolve("en")
            .neural_voices
            .clone();
        Ok(Self {
            http,
            config: RwLock::new(config),
            fallback_voices,
        })
    }

    pub fn set_config(&self, config: CloudConfig) {
        *self.config.write() = config;
    }

    /// Render `text` as speech with the profile's neural voice.
    ///
    /// Returns the encoded audio in the configured output format.
    pub async fn synthesize(
        &self,
        text: &str,
        profile: &LanguageProfile,
        mode: VoiceMode,
    ) -> Result<Vec<u8>, DomainError> {
        let config = self.config.read().clone();
        let voice = profile
            .neural_voices
            .as_ref()
            .or(self.fallback_voices.as_ref())
            .map(|voices| voices.for_mode(mode).to_string())
            .ok_or_else(|| {
                DomainError::Synthesis(format!("No neural voice for '{}'", profile.id))
            })?;

        let ssml = render_ssml(text, &profile.speech_locale, &voice, mode);
        let mut headers = vec![(
            "X-Microsoft-OutputFormat".to_string(),
            config.synthesis_format.clone(),
        )];
        let mut url = config.synthesis_url.clone();
        if let Some(token) = self.fetch_token(&config).await? {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token.token)));
            url = url.replace("{region}", &token.region);
        }

        debug!(voice = %voice, ?mode, chars = text.chars().count(), "Requesting cloud synthesis");
        let audio = self
            .http
            .post_bytes(&url, ssml.into_bytes(), "application/ssml+xml", &headers)
            .await
            .map_err(|e| match e {
                DomainError::NetworkBlocked { .. } => e,
                other => DomainError::Synthesis(other.to_string()),
            })?;

        info!(voice = %voice, bytes = audio.len(), "Cloud synthesis complete");
        Ok(audio)
    }

    async fn fetch_token(&self, config: &CloudConfig) -> Result<Option<SpeechToken>, DomainError> {
        let Some(token_url) = config.token_url.as_deref() else {
            return Ok(None);
        };
        let body = self
            .http
            .post_bytes(token_url, Vec::new(), "application/json", &[])
            .await?;
        let token: SpeechToken = serde_json::from_slice(&body)?;
        debug!(region = %token.region, "Speech token issued");
        Ok(Some(token))
    }

    async fn upload(
        &self,
        wav: Vec<u8>,
        digest: &str,
        config: &TranscribeConfig,
    ) -> Result<String, DomainError> {
        let cloud = self.config.read().clone();

        let mut headers = Vec::new();
        if let Some(token) = self.fetch_token(&cloud).await? {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token.token)));
        }

        let mut form = MultipartForm::new()
            .text("model", config.model.clone())
            .text("response_format", "text")
            .text("temperature", config.temperature.to_string())
            .file(FilePart {
                field: "file".to_string(),
                file_name: format!("{}.wav", &digest[..digest.len().min(16)]),
                mime: "audio/wav".to_string(),
                bytes: wav,
            });
        if let Some(language) = &config.language {
            form = form.text("language", language.clone());
        }
        headers.push(("X-Audio-SHA256".to_string(), digest.to_string()));

        self.http
            .post_multipart(&cloud.transcription_url, form, &headers)
            .await
    }
}

#[async_trait]
impl<H: HttpClient + 'static> Transcriber for CloudSpeechClient<H> {
    async fn transcribe(
        &self,
        audio: &AudioBuffer,
        config: &TranscribeConfig,
    ) -> Result<TranscriptionResult, DomainError> {
        if audio.is_empty() {
            return Err(DomainError::Transcription("Audio buffer is empty".to_string()));
        }

        let started = Instant::now();
        let wav = encode_wav(audio)?;
        let digest = sha256_hex(&wav);
        info!(
            duration_secs = audio.duration_secs(),
            bytes = wav.len(),
            language = ?config.language,
            "Uploading audio for transcription"
        );

        let text = self
            .upload(wav, &digest, config)
            .await
            .map_err(|e| match e {
                DomainError::NetworkBlocked { .. } => e,
                other => {
                    warn!(error = %other, "Transcription request failed");
                    DomainError::TranscriptionNetworkFailure(other.to_string())
                }
            })?;

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(duration_ms, chars = text.len(), "Transcription complete");

        Ok(TranscriptionResult {
            text: text.trim().to_string(),
            language: config.language.clone(),
            duration_ms,
            audio_digest: digest,
        })
    }
}

/// Package a buffer as 16-bit PCM WAV.
pub fn encode_wav(audio: &AudioBuffer) -> Result<Vec<u8>, DomainError> {
    let spec = hound::WavSpec {
        channels: audio.channels(),
        sample_rate: audio.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(44 + audio.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in audio.samples() {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn render_ssml(text: &str, locale: &str, voice: &str, mode: VoiceMode) -> String {
    let style = match mode {
        VoiceMode::Normal => "empathetic",
        VoiceMode::Emergency => "serious",
    };
    format!(
        concat!(
            r#"<speak version="1.0" xmlns="http://www.w3.org/2001/10/synthesis" "#,
            r#"xmlns:mstts="http://www.w3.org/2001/mstts" xml:lang="{locale}">"#,
            r#"<voice name="{voice}">"#,
            r#"<mstts:express-as style="{style}" styledegree="2">"#,
            r#"<prosody rate="0%">{text}</prosody>"#,
            r#"</mstts:express-as></voice></speak>"#
        ),
        locale = escape_xml(locale),
        voice = escape_xml(voice),
        style = style,
        text = escape_xml(text),
    )
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
