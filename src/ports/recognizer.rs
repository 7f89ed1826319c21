use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::domain::config::RecognitionConfig;
use crate::domain::{DomainError, RecognitionEvent};

/// Parameters for one recognition session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionRequest {
    /// BCP-47 locale, e.g. "ta-IN".
    pub locale: String,
    pub continuous: bool,
    pub interim_results: bool,
    pub max_alternatives: u32,
}

impl RecognitionRequest {
    pub fn new(locale: &str, config: &RecognitionConfig) -> Self {
        Self {
            locale: locale.to_string(),
            continuous: config.continuous,
            interim_results: config.interim_results,
            max_alternatives: config.max_alternatives,
        }
    }
}

/// Port for the platform's continuous speech recognition.
///
/// Lifecycle notifications (start confirmed, results, errors, end) are
/// published on the channel returned by [`subscribe`](Self::subscribe).
/// Every started session is eventually followed by
/// [`RecognitionEvent::Ended`].
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Whether the platform offers speech recognition at all.
    fn is_supported(&self) -> bool;

    /// Ask the platform to begin recognizing.
    async fn start(&self, request: &RecognitionRequest) -> Result<(), DomainError>;

    /// Ask the platform to stop; the end notification follows.
    async fn stop(&self) -> Result<(), DomainError>;

    /// Subscribe to recognition events.
    fn subscribe(&self) -> broadcast::Receiver<RecognitionEvent>;
}
