use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::domain::config::RecognitionConfig;
use crate::domain::{
    DomainError, MicrophoneArbiter, MicrophoneHolder, RecognitionEffect, RecognitionErrorCode,
    RecognitionEvent, RecognitionPhase, RecognitionSession,
};
use crate::ports::{RecognitionRequest, SpeechRecognizer};

/// Drives the platform recognizer through the [`RecognitionSession`] state
/// machine.
///
/// Sessions never restart on their own: after an error the platform ends the
/// session and a new one needs an explicit [`start`](Self::start).
pub struct RecognitionController {
    recognizer: Arc<dyn SpeechRecognizer>,
    arbiter: Arc<MicrophoneArbiter>,
    config: RecognitionConfig,
    session: RecognitionSession,
}

impl RecognitionController {
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        arbiter: Arc<MicrophoneArbiter>,
        config: RecognitionConfig,
    ) -> Result<Self, DomainError> {
        if !recognizer.is_supported() {
            return Err(DomainError::CapabilityUnsupported {
                capability: "speech recognition",
            });
        }
        Ok(Self {
            recognizer,
            arbiter,
            config,
            session: RecognitionSession::new(),
        })
    }

    pub fn phase(&self) -> RecognitionPhase {
        self.session.phase()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecognitionEvent> {
        self.recognizer.subscribe()
    }

    pub fn set_config(&mut self, config: RecognitionConfig) {
        self.config = config;
    }

    /// Begin a session in `locale`.
    ///
    /// Fails with `RecognitionAlreadyActive` unless Idle, and with
    /// `MicrophoneUnavailable` while a recording holds the microphone.
    pub async fn start(&mut self, locale: &str) -> Result<(), DomainError> {
        if self.session.phase().is_active() {
            return Err(DomainError::RecognitionAlreadyActive);
        }
        let lease = self.arbiter.acquire(MicrophoneHolder::Recognition)?;
        self.session.begin(locale, lease)?;

        let request = RecognitionRequest::new(locale, &self.config);
        if let Err(e) = self.recognizer.start(&request).await {
            error!(locale, error = %e, "Recognizer failed to start");
            self.unwind(RecognitionErrorCode::Other(e.to_string()));
            return Err(e);
        }

        info!(locale, "Recognition starting");
        Ok(())
    }

    /// Ask the platform to stop. A no-op unless Starting or Listening.
    pub async fn stop(&mut self) -> Result<(), DomainError> {
        if !self.session.request_stop() {
            debug!(phase = ?self.session.phase(), "Stop ignored");
            return Ok(());
        }
        if let Err(e) = self.recognizer.stop().await {
            // The platform will not report the end of a session it failed to stop
            warn!(error = %e, "Recognizer failed to stop, ending session locally");
            self.unwind(RecognitionErrorCode::Other(e.to_string()));
            return Err(e);
        }
        info!("Recognition stopping");
        Ok(())
    }

    /// Teardown: ask the platform to stop. The session stays open until the
    /// platform reports the end; only a failed stop request drops it locally.
    pub async fn abort(&mut self) {
        if let Err(e) = self.stop().await {
            warn!(error = %e, "Recognizer failed to stop during teardown");
        }
    }

    /// Apply a platform event to the session.
    pub fn handle_event(
        &mut self,
        event: &RecognitionEvent,
    ) -> Result<RecognitionEffect, DomainError> {
        let effect = self.session.apply(event)?;
        match &effect {
            RecognitionEffect::Activated => info!(
                locale = self.session.locale().unwrap_or_default(),
                "Recognition listening"
            ),
            RecognitionEffect::Transcript(text) => debug!(transcript = %text, "Final transcript"),
            RecognitionEffect::Failed(code) => error!(code = %code, "Recognition error"),
            RecognitionEffect::Ended { previous } => info!(?previous, "Recognition ended"),
            RecognitionEffect::Ignored => debug!(event = event.name(), "Recognition event ignored"),
        }
        Ok(effect)
    }

    /// Walk the session back to Idle through the error path.
    fn unwind(&mut self, code: RecognitionErrorCode) {
        let _ = self.session.apply(&RecognitionEvent::Error(code));
        let _ = self.session.apply(&RecognitionEvent::Ended);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::FakeRecognizer;

    fn controller(recognizer: &Arc<FakeRecognizer>) -> (RecognitionController, Arc<MicrophoneArbiter>) {
        let arbiter = Arc::new(MicrophoneArbiter::new());
        let controller = RecognitionController::new(
            Arc::clone(recognizer) as Arc<dyn SpeechRecognizer>,
            Arc::clone(&arbiter),
            RecognitionConfig::default(),
        )
        .unwrap();
        (controller, arbiter)
    }

    #[test]
    fn test_unsupported_platform() {
        let recognizer = Arc::new(FakeRecognizer::unsupported());
        let result = RecognitionController::new(
            recognizer,
            Arc::new(MicrophoneArbiter::new()),
            RecognitionConfig::default(),
        );
        assert!(matches!(
            result,
            Err(DomainError::CapabilityUnsupported { .. })
        ));
    }

    #[tokio::test]
    async fn test_start_requests_continuous_final_results() {
        let recognizer = Arc::new(FakeRecognizer::new());
        let (mut controller, arbiter) = controller(&recognizer);

        controller.start("hi-IN").await.unwrap();
        assert_eq!(controller.phase(), RecognitionPhase::Starting);
        assert_eq!(arbiter.holder(), Some(MicrophoneHolder::Recognition));

        let requests = recognizer.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].locale, "hi-IN");
        assert!(requests[0].continuous);
        assert!(!requests[0].interim_results);
        assert_eq!(requests[0].max_alternatives, 1);
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let recognizer = Arc::new(FakeRecognizer::new());
        let (mut controller, _arbiter) = controller(&recognizer);

        controller.start("en-US").await.unwrap();
        let err = controller.start("en-US").await.unwrap_err();
        assert!(matches!(err, DomainError::RecognitionAlreadyActive));
        assert_eq!(recognizer.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_platform_start_returns_to_idle() {
        let recognizer = Arc::new(FakeRecognizer::new());
        recognizer.fail_next_start();
        let (mut controller, arbiter) = controller(&recognizer);

        assert!(controller.start("ta-IN").await.is_err());
        assert_eq!(controller.phase(), RecognitionPhase::Idle);
        assert!(arbiter.is_free());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_when_idle() {
        let recognizer = Arc::new(FakeRecognizer::new());
        let (mut controller, _arbiter) = controller(&recognizer);

        controller.stop().await.unwrap();
        controller.stop().await.unwrap();
        assert_eq!(recognizer.stop_count(), 0);
    }

    #[tokio::test]
    async fn test_full_lifecycle_through_events() {
        let recognizer = Arc::new(FakeRecognizer::new());
        let (mut controller, arbiter) = controller(&recognizer);

        controller.start("en-US").await.unwrap();
        controller.handle_event(&RecognitionEvent::Started).unwrap();
        assert_eq!(controller.phase(), RecognitionPhase::Listening);

        let effect = controller
            .handle_event(&RecognitionEvent::Result {
                transcript: "next".to_string(),
                is_final: true,
            })
            .unwrap();
        assert_eq!(effect, RecognitionEffect::Transcript("next".to_string()));

        controller.stop().await.unwrap();
        assert_eq!(recognizer.stop_count(), 1);
        assert_eq!(controller.phase(), RecognitionPhase::Stopping);

        controller.handle_event(&RecognitionEvent::Ended).unwrap();
        assert_eq!(controller.phase(), RecognitionPhase::Idle);
        assert!(arbiter.is_free());
    }

    #[tokio::test]
    async fn test_abort_waits_for_platform_end() {
        let recognizer = Arc::new(FakeRecognizer::new());
        let (mut controller, arbiter) = controller(&recognizer);

        controller.start("en-US").await.unwrap();
        controller.handle_event(&RecognitionEvent::Started).unwrap();
        controller.abort().await;

        assert_eq!(recognizer.stop_count(), 1);
        assert_eq!(controller.phase(), RecognitionPhase::Stopping);
        assert!(!arbiter.is_free());

        controller.handle_event(&RecognitionEvent::Ended).unwrap();
        assert_eq!(controller.phase(), RecognitionPhase::Idle);
        assert!(arbiter.is_free());
    }

    #[tokio::test]
    async fn test_abort_after_failed_stop_releases_microphone() {
        let recognizer = Arc::new(FakeRecognizer::new());
        let (mut controller, arbiter) = controller(&recognizer);

        controller.start("en-US").await.unwrap();
        recognizer.fail_next_stop();
        controller.abort().await;

        assert_eq!(controller.phase(), RecognitionPhase::Idle);
        assert!(arbiter.is_free());
    }

    #[tokio::test]
    async fn test_abort_leaves_errored_session_to_platform() {
        let recognizer = Arc::new(FakeRecognizer::new());
        let (mut controller, _arbiter) = controller(&recognizer);

        controller.start("en-US").await.unwrap();
        controller
            .handle_event(&RecognitionEvent::Error(RecognitionErrorCode::Network))
            .unwrap();
        controller.abort().await;

        assert_eq!(recognizer.stop_count(), 0);
        assert_eq!(controller.phase(), RecognitionPhase::Errored);
    }

    #[tokio::test]
    async fn test_recording_holds_microphone() {
        let recognizer = Arc::new(FakeRecognizer::new());
        let (mut controller, arbiter) = controller(&recognizer);

        let _recording = arbiter.acquire(MicrophoneHolder::Recording).unwrap();
        let err = controller.start("en-US").await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::MicrophoneUnavailable {
                holder: MicrophoneHolder::Recording
            }
        ));
        assert!(recognizer.requests().is_empty());
    }
}
