use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Microphone settings requested from the capture device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConstraints {
    /// Target sample rate in Hz.
    pub sample_rate: u32,
    /// Number of channels (1 for speech).
    pub channels: u16,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    /// How often the device hands over a chunk of audio.
    pub chunk_interval_ms: u32,
    /// Hard cap on a single recording.
    pub max_duration_secs: u32,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            echo_cancellation: true,
            noise_suppression: true,
            chunk_interval_ms: 1_000,
            max_duration_secs: 60,
        }
    }
}

impl CaptureConstraints {
    /// Maximum number of samples a recording may hold.
    pub fn max_samples(&self) -> usize {
        self.max_duration_secs as usize * self.sample_rate as usize * self.channels.max(1) as usize
    }
}

/// A slice of raw audio delivered by the capture device while recording.
#[derive(Debug, Clone, Zeroize)]
#[zeroize(drop)]
pub struct AudioChunk {
    samples: Vec<i16>,
}

impl AudioChunk {
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Audio buffer that is securely zeroed on drop.
/// Recorded speech never touches disk and is cleared from memory after
/// transcription.
#[derive(Debug, Zeroize)]
#[zeroize(drop)]
pub struct AudioBuffer {
    /// PCM audio samples (16-bit).
    samples: Vec<i16>,
    /// Sample rate in Hz.
    sample_rate: u32,
    /// Number of channels.
    channels: u16,
}

impl AudioBuffer {
    /// Create a new empty mono buffer.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate,
            channels: 1,
        }
    }

    /// Concatenate recorded chunks into one buffer, in delivery order.
    pub fn from_chunks(sample_rate: u32, channels: u16, chunks: &[AudioChunk]) -> Self {
        let total = chunks.iter().map(AudioChunk::len).sum();
        let mut samples = Vec::with_capacity(total);
        for chunk in chunks {
            samples.extend_from_slice(chunk.samples());
        }
        Self {
            samples,
            sample_rate,
            channels: channels.max(1),
        }
    }

    /// Append samples to the buffer.
    pub fn push_samples(&mut self, samples: &[i16]) {
        self.samples.extend_from_slice(samples);
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / (self.sample_rate as f32 * self.channels as f32)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Clear the buffer (samples are zeroed first).
    pub fn clear(&mut self) {
        self.samples.zeroize();
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_buffer_creation() {
        let buffer = AudioBuffer::new(16000);
        assert!(buffer.is_empty());
        assert_eq!(buffer.sample_rate(), 16000);
        assert_eq!(buffer.channels(), 1);
    }

    #[test]
    fn test_from_chunks_keeps_order() {
        let chunks = vec![
            AudioChunk::new(vec![1, 2]),
            AudioChunk::new(vec![]),
            AudioChunk::new(vec![3]),
        ];
        let buffer = AudioBuffer::from_chunks(16000, 1, &chunks);
        assert_eq!(buffer.samples(), &[1, 2, 3]);
    }

    #[test]
    fn test_audio_buffer_duration() {
        let mut buffer = AudioBuffer::new(16000);
        // 16000 samples = 1 second at 16kHz
        buffer.push_samples(&vec![0i16; 16000]);
        assert!((buffer.duration_secs() - 1.0).abs() < 0.001);

        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_capture_constraints_default() {
        let constraints = CaptureConstraints::default();
        assert_eq!(constraints.sample_rate, 16_000);
        assert_eq!(constraints.channels, 1);
        assert!(constraints.echo_cancellation);
        assert!(constraints.noise_suppression);
        // 60 seconds * 16000 samples/sec
        assert_eq!(constraints.max_samples(), 960_000);
    }
}
