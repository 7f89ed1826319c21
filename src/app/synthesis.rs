use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::domain::{
    DomainError, LanguageProfile, Prosody, SynthesisEvent, UtteranceId, UtteranceRequest,
    VoiceResolver,
};
use crate::ports::SpeechSynthesizer;

struct PendingUtterance {
    id: UtteranceId,
    text: String,
    profile: Arc<LanguageProfile>,
}

/// Single-slot speech output.
///
/// Every `speak` supersedes whatever was playing or waiting, so at most one
/// utterance is ever audible. Playback failures are logged and swallowed.
pub struct SpeechQueue {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    resolver: VoiceResolver,
    prosody: Prosody,
    next_id: u64,
    /// Waiting for the platform voice catalog.
    pending: Option<PendingUtterance>,
    in_flight: Option<UtteranceId>,
}

impl SpeechQueue {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        resolver: VoiceResolver,
        prosody: Prosody,
    ) -> Result<Self, DomainError> {
        if !synthesizer.is_supported() {
            return Err(DomainError::CapabilityUnsupported {
                capability: "speech synthesis",
            });
        }
        Ok(Self {
            synthesizer,
            resolver,
            prosody,
            next_id: 0,
            pending: None,
            in_flight: None,
        })
    }

    pub fn set_prosody(&mut self, prosody: Prosody) {
        self.prosody = prosody;
    }

    pub fn set_resolver(&mut self, resolver: VoiceResolver) {
        self.resolver = resolver;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SynthesisEvent> {
        self.synthesizer.subscribe()
    }

    /// Whether an utterance is playing or waiting for voices.
    pub fn is_speaking(&self) -> bool {
        self.in_flight.is_some() || self.pending.is_some()
    }

    pub fn in_flight(&self) -> Option<UtteranceId> {
        self.in_flight
    }

    /// Replace anything playing with `text` spoken in the profile's language.
    ///
    /// Returns the utterance id, or `None` for blank text.
    pub async fn speak(
        &mut self,
        text: &str,
        profile: &Arc<LanguageProfile>,
    ) -> Option<UtteranceId> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        self.cancel();

        self.next_id += 1;
        let id = UtteranceId(self.next_id);
        let pending = PendingUtterance {
            id,
            text: text.to_string(),
            profile: Arc::clone(profile),
        };

        if !self.synthesizer.voices_loaded() {
            debug!(%id, "Voice catalog not loaded, parking utterance");
            self.pending = Some(pending);
        } else {
            self.dispatch(pending).await;
        }
        Some(id)
    }

    /// Stop the current utterance and forget the parked one.
    pub fn cancel(&mut self) {
        let dropped = self.pending.take();
        let interrupted = self.in_flight.take();
        if dropped.is_some() || interrupted.is_some() {
            debug!(?interrupted, "Speech cancelled");
        }
        self.synthesizer.cancel();
    }

    pub async fn handle_event(&mut self, event: &SynthesisEvent) {
        match event {
            SynthesisEvent::Started(id) if self.is_current(*id) => {
                debug!(%id, "Utterance started");
            }
            SynthesisEvent::Ended(id) if self.is_current(*id) => {
                debug!(%id, "Utterance finished");
                self.in_flight = None;
            }
            SynthesisEvent::Failed { id, message } if self.is_current(*id) => {
                warn!(%id, message = %message, "Utterance failed");
                self.in_flight = None;
            }
            SynthesisEvent::VoicesChanged => {
                let count = self.synthesizer.voices().len();
                debug!(count, "Voice catalog changed");
                if let Some(pending) = self.pending.take() {
                    self.dispatch(pending).await;
                }
            }
            _ => debug!(?event, "Ignoring event for superseded utterance"),
        }
    }

    fn is_current(&self, id: UtteranceId) -> bool {
        self.in_flight == Some(id)
    }

    async fn dispatch(&mut self, pending: PendingUtterance) {
        let PendingUtterance { id, text, profile } = pending;
        let voices = self.synthesizer.voices();

        let voice = match self.resolver.resolve(&profile, &voices) {
            Some(selection) => {
                info!(
                    %id,
                    language = %profile.id,
                    voice = %selection.voice.name,
                    voice_locale = %selection.voice.locale,
                    tier = %selection.tier,
                    "Voice selected"
                );
                Some(selection.voice.clone())
            }
            None => {
                let err = DomainError::NoVoiceAvailable {
                    locale: profile.speech_locale.clone(),
                };
                warn!(%id, error = %err, "Speaking with the platform default voice");
                None
            }
        };

        let request = UtteranceRequest {
            id,
            text,
            locale: profile.speech_locale.clone(),
            voice,
            prosody: self.prosody,
        };

        self.in_flight = Some(id);
        if let Err(e) = self.synthesizer.speak(&request).await {
            warn!(%id, error = %e, "Synthesizer rejected utterance");
            self.in_flight = None;
        }
    }
}
