use async_trait::async_trait;

use crate::domain::{AudioChunk, CaptureConstraints, DomainError};

/// Port for raw microphone capture.
///
/// Implementations handle the platform device. Microphone ownership is
/// arbitrated by the caller, not by the capture device.
#[async_trait]
pub trait AudioCapture: Send + Sync {
    /// Whether a capture device can be opened on this platform.
    fn is_supported(&self) -> bool;

    /// Open the device and start capturing.
    async fn start(&self, constraints: &CaptureConstraints) -> Result<(), DomainError>;

    /// Hand over the chunks completed since the last call.
    async fn drain(&self) -> Result<Vec<AudioChunk>, DomainError>;

    /// Stop capturing and return whatever audio was still pending.
    async fn stop(&self) -> Result<Vec<AudioChunk>, DomainError>;
}
