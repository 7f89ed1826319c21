
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::audio::{AudioBuffer, AudioChunk, CaptureConstraints};
use crate::domain::microphone::MicrophoneLease;
use crate::domain::DomainError;

/// Recording session state machine.
///
/// - Idle -> Recording (begin)
/// - Recording -> Finalizing (finalize)
/// - Finalizing -> Idle (finish, returns AudioBuffer)
/// - Recording | Finalizing -> Idle (abort, audio discarded)
///
/// Chunks are accepted while Recording and Finalizing, since the capture
/// device flushes its last chunk after being asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecordingPhase {
    #[default]
    Idle,
    Recording,
    Finalizing,
}

impl RecordingPhase {
    #[must_use]
    pub fn accepts_chunks(&self) -> bool {
        matches!(self, RecordingPhase::Recording | RecordingPhase::Finalizing)
    }
}

/// Audio accumulated for one cloud transcription.
#[derive(Debug, Default)]
pub struct RecordingSession {
    phase: RecordingPhase,
    chunks: Vec<AudioChunk>,
    buffered_samples: usize,
    constraints: CaptureConstraints,
    lease: Option<MicrophoneLease>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> RecordingPhase {
        self.phase
    }

    pub fn holds_microphone(&self) -> bool {
        self.lease.is_some()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn begin(
        &mut self,
        lease: MicrophoneLease,
        constraints: CaptureConstraints,
    ) -> Result<(), DomainError> {
        if self.phase != RecordingPhase::Idle {
            return Err(DomainError::RecordingAlreadyActive);
        }
        self.phase = RecordingPhase::Recording;
        self.chunks.clear();
        self.buffered_samples = 0;
        self.constraints = constraints;
        self.lease = Some(lease);
        debug!("Recording session started");
        Ok(())
    }

    /// Buffer a chunk. Returns false if the chunk was dropped.
    pub fn push_chunk(&mut self, chunk: AudioChunk) -> bool {
        if !self.phase.accepts_chunks() {
            debug!(phase = ?self.phase, "Dropping audio chunk outside a recording");
            return false;
        }
        if chunk.is_empty() {
            return true;
        }
        let limit = self.constraints.max_samples();
        if self.buffered_samples + chunk.len() > limit {
            warn!(limit, "Recording reached its maximum duration, dropping audio");
            return false;
        }
        self.buffered_samples += chunk.len();
        self.chunks.push(chunk);
        true
    }

    /// Recording -> Finalizing.
    pub fn finalize(&mut self) -> Result<(), DomainError> {
        if self.phase != RecordingPhase::Recording {
            return Err(DomainError::NoActiveRecording);
        }
        self.phase = RecordingPhase::Finalizing;
        Ok(())
    }

    /// Finalizing -> Idle: concatenate everything recorded and release the
    /// microphone.
    pub fn finish(&mut self) -> Result<AudioBuffer, DomainError> {
        if self.phase != RecordingPhase::Finalizing {
            return Err(DomainError::NoActiveRecording);
        }
        let buffer = AudioBuffer::from_chunks(
            self.constraints.sample_rate,
            self.constraints.channels,
            &self.chunks,
        );
        self.reset();
        debug!(samples = buffer.len(), "Recording session finished");
        Ok(buffer)
    }

    /// Discard everything and release the microphone. Harmless when idle.
    pub fn abort(&mut self) {
        if self.phase != RecordingPhase::Idle {
            debug!(phase = ?self.phase, "Recording session aborted");
        }
        self.reset();
    }

    fn reset(&mut self) {
        // Chunks zero themselves on drop
        self.chunks.clear();
        self.buffered_samples = 0;
        self.lease = None;
        self.phase = RecordingPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::microphone::{MicrophoneArbiter, MicrophoneHolder};
    use std::sync::Arc;

    fn started(arbiter: &Arc<MicrophoneArbiter>) -> RecordingSession {
        let mut session = RecordingSession::new();
        let lease = arbiter.acquire(MicrophoneHolder::Recording).unwrap();
        session.begin(lease, CaptureConstraints::default()).unwrap();
        session
    }

    #[test]
    fn test_record_finalize_finish() {
        let arbiter = Arc::new(MicrophoneArbiter::new());
        let mut session = started(&arbiter);
        assert_eq!(session.phase(), RecordingPhase::Recording);

        assert!(session.push_chunk(AudioChunk::new(vec![1, 2, 3])));
        session.finalize().unwrap();
        // Late chunk flushed by the device after stop
        assert!(session.push_chunk(AudioChunk::new(vec![4])));

        let buffer = session.finish().unwrap();
        assert_eq!(buffer.samples(), &[1, 2, 3, 4]);
        assert_eq!(session.phase(), RecordingPhase::Idle);
        assert!(arbiter.is_free());
    }

    #[test]
    fn test_stop_while_idle_fails() {
        let mut session = RecordingSession::new();
        assert!(matches!(
            session.finalize(),
            Err(DomainError::NoActiveRecording)
        ));
        assert!(matches!(session.finish(), Err(DomainError::NoActiveRecording)));
        assert!(!session.push_chunk(AudioChunk::new(vec![1])));
    }

    #[test]
    fn test_begin_twice_fails() {
        let arbiter = Arc::new(MicrophoneArbiter::new());
        let mut session = started(&arbiter);
        let other = Arc::new(MicrophoneArbiter::new());
        let lease = other.acquire(MicrophoneHolder::Recording).unwrap();
        assert!(matches!(
            session.begin(lease, CaptureConstraints::default()),
            Err(DomainError::RecordingAlreadyActive)
        ));
    }

    #[test]
    fn test_abort_discards_audio_and_releases() {
        let arbiter = Arc::new(MicrophoneArbiter::new());
        let mut session = started(&arbiter);
        session.push_chunk(AudioChunk::new(vec![9; 10]));

        session.abort();
        assert_eq!(session.phase(), RecordingPhase::Idle);
        assert_eq!(session.chunk_count(), 0);
        assert!(arbiter.is_free());
    }

    #[test]
    fn test_duration_cap() {
        let arbiter = Arc::new(MicrophoneArbiter::new());
        let mut session = RecordingSession::new();
        let constraints = CaptureConstraints {
            sample_rate: 4,
            max_duration_secs: 1,
            ..CaptureConstraints::default()
        };
        session
            .begin(arbiter.acquire(MicrophoneHolder::Recording).unwrap(), constraints)
            .unwrap();

        assert!(session.push_chunk(AudioChunk::new(vec![0; 3])));
        assert!(!session.push_chunk(AudioChunk::new(vec![0; 2])));
        assert_eq!(session.chunk_count(), 1);
    }
}
