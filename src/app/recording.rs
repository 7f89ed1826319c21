use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{
    AudioBuffer, AudioChunk, CaptureConstraints, DomainError, MicrophoneArbiter, MicrophoneHolder,
    RecordingPhase, RecordingSession,
};
use crate::ports::AudioCapture;

/// Buffers microphone audio for the cloud transcription path.
pub struct RecordingController {
    capture: Arc<dyn AudioCapture>,
    arbiter: Arc<MicrophoneArbiter>,
    constraints: CaptureConstraints,
    session: RecordingSession,
}

impl RecordingController {
    pub fn new(
        capture: Arc<dyn AudioCapture>,
        arbiter: Arc<MicrophoneArbiter>,
        constraints: CaptureConstraints,
    ) -> Self {
        Self {
            capture,
            arbiter,
            constraints,
            session: RecordingSession::new(),
        }
    }

    pub fn phase(&self) -> RecordingPhase {
        self.session.phase()
    }

    pub fn is_recording(&self) -> bool {
        self.session.phase() != RecordingPhase::Idle
    }

    pub fn set_constraints(&mut self, constraints: CaptureConstraints) {
        self.constraints = constraints;
    }

    pub async fn start(&mut self) -> Result<(), DomainError> {
        if !self.capture.is_supported() {
            return Err(DomainError::CapabilityUnsupported {
                capability: "audio capture",
            });
        }
        if self.is_recording() {
            return Err(DomainError::RecordingAlreadyActive);
        }

        let lease = self.arbiter.acquire(MicrophoneHolder::Recording)?;
        self.session.begin(lease, self.constraints.clone())?;

        if let Err(e) = self.capture.start(&self.constraints).await {
            warn!(error = %e, "Audio capture failed to start");
            self.session.abort();
            return Err(e);
        }

        info!(
            sample_rate = self.constraints.sample_rate,
            max_duration_secs = self.constraints.max_duration_secs,
            "Recording started"
        );
        Ok(())
    }

    /// Move chunks completed so far from the device into the session.
    pub async fn collect(&mut self) -> Result<usize, DomainError> {
        if !self.session.phase().accepts_chunks() {
            return Ok(0);
        }
        let chunks = self.capture.drain().await?;
        Ok(self.absorb(chunks))
    }

    /// Stop capturing and hand back everything recorded.
    pub async fn stop(&mut self) -> Result<AudioBuffer, DomainError> {
        if self.session.phase() != RecordingPhase::Recording {
            return Err(DomainError::NoActiveRecording);
        }
        if let Err(e) = self.collect().await {
            warn!(error = %e, "Failed to drain audio before stopping");
        }
        self.session.finalize()?;

        match self.capture.stop().await {
            Ok(tail) => {
                self.absorb(tail);
            }
            Err(e) => {
                self.session.abort();
                return Err(e);
            }
        }

        let buffer = self.session.finish()?;
        info!(
            samples = buffer.len(),
            duration_secs = buffer.duration_secs(),
            "Recording stopped"
        );
        Ok(buffer)
    }

    /// Discard the recording and release the microphone.
    pub async fn abort(&mut self) {
        if !self.is_recording() {
            return;
        }
        if let Err(e) = self.capture.stop().await {
            warn!(error = %e, "Audio capture failed to stop during teardown");
        }
        self.session.abort();
        info!("Recording discarded");
    }

    fn absorb(&mut self, chunks: Vec<AudioChunk>) -> usize {
        let mut accepted = 0;
        for chunk in chunks {
            if self.session.push_chunk(chunk) {
                accepted += 1;
            }
        }
        if accepted > 0 {
            debug!(accepted, total = self.session.chunk_count(), "Audio chunks buffered");
        }
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::FakeCapture;

    fn controller(capture: &Arc<FakeCapture>) -> (RecordingController, Arc<MicrophoneArbiter>) {
        let arbiter = Arc::new(MicrophoneArbiter::new());
        let controller = RecordingController::new(
            Arc::clone(capture) as Arc<dyn AudioCapture>,
            Arc::clone(&arbiter),
            CaptureConstraints::default(),
        );
        (controller, arbiter)
    }

    #[tokio::test]
    async fn test_record_and_stop() {
        let capture = Arc::new(FakeCapture::new());
        let (mut controller, arbiter) = controller(&capture);

        controller.start().await.unwrap();
        assert_eq!(arbiter.holder(), Some(MicrophoneHolder::Recording));
        assert!(capture.is_running());

        capture.queue(vec![1, 2, 3]);
        assert_eq!(controller.collect().await.unwrap(), 1);
        capture.queue(vec![4, 5]);
        capture.queue_tail(vec![6]);

        let buffer = controller.stop().await.unwrap();
        assert_eq!(buffer.samples(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(buffer.sample_rate(), 16000);
        assert_eq!(controller.phase(), RecordingPhase::Idle);
        assert!(arbiter.is_free());
        assert!(!capture.is_running());
    }

    #[tokio::test]
    async fn test_stop_without_recording() {
        let capture = Arc::new(FakeCapture::new());
        let (mut controller, _arbiter) = controller(&capture);

        let err = controller.stop().await.unwrap_err();
        assert!(matches!(err, DomainError::NoActiveRecording));
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let capture = Arc::new(FakeCapture::new());
        let (mut controller, _arbiter) = controller(&capture);

        controller.start().await.unwrap();
        let err = controller.start().await.unwrap_err();
        assert!(matches!(err, DomainError::RecordingAlreadyActive));
        assert_eq!(capture.start_count(), 1);
    }

    #[tokio::test]
    async fn test_recognition_holds_microphone() {
        let capture = Arc::new(FakeCapture::new());
        let (mut controller, arbiter) = controller(&capture);

        let _listening = arbiter.acquire(MicrophoneHolder::Recognition).unwrap();
        let err = controller.start().await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::MicrophoneUnavailable {
                holder: MicrophoneHolder::Recognition
            }
        ));
        assert_eq!(capture.start_count(), 0);
        assert_eq!(controller.phase(), RecordingPhase::Idle);
    }

    #[tokio::test]
    async fn test_unsupported_capture() {
        let capture = Arc::new(FakeCapture::unsupported());
        let (mut controller, arbiter) = controller(&capture);

        let err = controller.start().await.unwrap_err();
        assert!(matches!(err, DomainError::CapabilityUnsupported { .. }));
        assert!(arbiter.is_free());
    }

    #[tokio::test]
    async fn test_abort_discards_audio() {
        let capture = Arc::new(FakeCapture::new());
        let (mut controller, arbiter) = controller(&capture);

        controller.start().await.unwrap();
        capture.queue(vec![7; 32]);
        controller.collect().await.unwrap();
        controller.abort().await;

        assert_eq!(controller.phase(), RecordingPhase::Idle);
        assert!(arbiter.is_free());
        assert!(matches!(
            controller.stop().await,
            Err(DomainError::NoActiveRecording)
        ));
    }
}
