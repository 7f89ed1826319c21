use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::{DomainError, SynthesisEvent, UtteranceRequest, VoiceDescriptor};

/// Port for the platform's speech synthesis.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Whether the platform offers speech synthesis at all.
    fn is_supported(&self) -> bool;

    /// Voices currently offered by the platform.
    ///
    /// May be empty until the platform has loaded its catalog, which it
    /// announces with [`SynthesisEvent::VoicesChanged`].
    fn voices(&self) -> Vec<VoiceDescriptor>;

    /// Whether the voice catalog has been populated at least once.
    fn voices_loaded(&self) -> bool;

    /// Begin playing an utterance. Completion is reported through events.
    async fn speak(&self, utterance: &UtteranceRequest) -> Result<(), DomainError>;

    /// Stop anything playing or queued on the platform immediately.
    fn cancel(&self);

    /// Subscribe to synthesis events.
    fn subscribe(&self) -> broadcast::Receiver<SynthesisEvent>;
}
