use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::HeapRb;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::domain::{AudioChunk, CaptureConstraints, DomainError};
use crate::ports::AudioCapture;

type RingProducer = ringbuf::HeapProd<i16>;
type RingConsumer = ringbuf::HeapCons<i16>;

type Reply<T> = oneshot::Sender<Result<T, DomainError>>;

/// Commands sent to the capture thread.
enum CaptureCommand {
    Start {
        constraints: CaptureConstraints,
        reply: Reply<()>,
    },
    Drain {
        reply: Reply<Vec<AudioChunk>>,
    },
    Stop {
        reply: Reply<Vec<AudioChunk>>,
    },
    Shutdown,
}

mod audio_processing {
    use super::*;

    pub fn default_device() -> Result<Device, DomainError> {
        cpal::default_host()
            .default_input_device()
            .ok_or_else(|| DomainError::AudioDevice {
                message: "No default input device available".to_string(),
            })
    }

    pub fn build_stream(
        device: &Device,
        target_sample_rate: u32,
        mut producer: RingProducer,
        device_lost: Arc<AtomicBool>,
    ) -> Result<Stream, DomainError> {
        let supported = device.default_input_config().map_err(|e| DomainError::AudioDevice {
            message: format!("Failed to get default config: {}", e),
        })?;
        let sample_format = supported.sample_format();
        let config = StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };
        debug!(
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            format = ?sample_format,
            "Device default config"
        );

        let channels = config.channels as usize;
        let device_sample_rate = config.sample_rate.0;
        let on_error = move |err: cpal::StreamError| {
            error!(?err, "Audio stream error");
            device_lost.store(true, Ordering::SeqCst);
        };

        let stream = match sample_format {
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let samples = to_mono(data, channels);
                    let samples = resample(&samples, device_sample_rate, target_sample_rate);
                    let _ = producer.push_slice(&samples);
                },
                on_error,
                None,
            ),
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let converted: Vec<i16> = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
                        .collect();
                    let samples = to_mono(&converted, channels);
                    let samples = resample(&samples, device_sample_rate, target_sample_rate);
                    let _ = producer.push_slice(&samples);
                },
                on_error,
                None,
            ),
            _ => {
                return Err(DomainError::AudioDevice {
                    message: format!("Unsupported sample format: {:?}", sample_format),
                });
            }
        }
        .map_err(|e| DomainError::AudioDevice {
            message: format!("Failed to build stream: {}", e),
        })?;

        Ok(stream)
    }

    pub fn to_mono(data: &[i16], channels: usize) -> Vec<i16> {
        if channels <= 1 {
            return data.to_vec();
        }
        data.chunks(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / frame.len() as i32) as i16
            })
            .collect()
    }

    pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
        if from_rate == to_rate || samples.is_empty() || to_rate == 0 {
            return samples.to_vec();
        }

        let ratio = from_rate as f64 / to_rate as f64;
        let output_len = (samples.len() as f64 / ratio).ceil() as usize;
        let mut output = Vec::with_capacity(output_len);

        for i in 0..output_len {
            let src_pos = i as f64 * ratio;
            let src_idx = src_pos.floor() as usize;
            let frac = src_pos.fract();

            let sample = if src_idx + 1 < samples.len() {
                let s0 = samples[src_idx] as f64;
                let s1 = samples[src_idx + 1] as f64;
                (s0 + (s1 - s0) * frac) as i16
            } else if src_idx < samples.len() {
                samples[src_idx]
            } else {
                0
            };
            output.push(sample);
        }
        output
    }

    /// Split `pending` into chunks of `chunk_len` samples. The incomplete
    /// tail stays in `pending` unless `flush` is set.
    pub fn take_chunks(pending: &mut Vec<i16>, chunk_len: usize, flush: bool) -> Vec<AudioChunk> {
        let chunk_len = chunk_len.max(1);
        let complete = if flush {
            pending.len()
        } else {
            pending.len() - pending.len() % chunk_len
        };
        let chunks = pending[..complete]
            .chunks(chunk_len)
            .map(|c| AudioChunk::new(c.to_vec()))
            .collect();
        pending.drain(..complete);
        chunks
    }
}

/// State owned by the capture thread.
struct CaptureSession {
    stream: Stream,
    consumer: RingConsumer,
    pending: Vec<i16>,
    chunk_len: usize,
}

impl CaptureSession {
    fn pull(&mut self) {
        let available = self.consumer.occupied_len();
        let start = self.pending.len();
        self.pending.resize(start + available, 0);
        let read = self.consumer.pop_slice(&mut self.pending[start..]);
        self.pending.truncate(start + read);
    }
}

fn capture_thread_main(device_lost: Arc<AtomicBool>, mut cmd_rx: mpsc::Receiver<CaptureCommand>) {
    // Stream is kept here on the capture thread (not Send)
    let mut session: Option<CaptureSession> = None;

    while let Some(cmd) = cmd_rx.blocking_recv() {
        match cmd {
            CaptureCommand::Start { constraints, reply } => {
                let result = (|| -> Result<(), DomainError> {
                    if session.is_some() {
                        return Err(DomainError::RecordingAlreadyActive);
                    }
                    if constraints.echo_cancellation || constraints.noise_suppression {
                        debug!("Echo cancellation and noise suppression are left to the OS input pipeline");
                    }

                    let device = audio_processing::default_device()?;
                    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

                    let ring = HeapRb::<i16>::new(constraints.max_samples().max(1));
                    let (producer, consumer) = ring.split();

                    device_lost.store(false, Ordering::SeqCst);
                    let stream = audio_processing::build_stream(
                        &device,
                        constraints.sample_rate,
                        producer,
                        Arc::clone(&device_lost),
                    )?;
                    stream.play().map_err(|e| DomainError::AudioDevice {
                        message: format!("Failed to start stream: {}", e),
                    })?;

                    let chunk_len = (constraints.sample_rate as u64
                        * constraints.chunk_interval_ms as u64
                        / 1000) as usize;
                    session = Some(CaptureSession {
                        stream,
                        consumer,
                        pending: Vec::new(),
                        chunk_len,
                    });

                    info!(device = %device_name, "Capture started");
                    Ok(())
                })();
                let _ = reply.send(result);
            }
            CaptureCommand::Drain { reply } => {
                let result = match session.as_mut() {
                    Some(_) if device_lost.load(Ordering::SeqCst) => Err(DomainError::AudioDevice {
                        message: "Input device was lost".to_string(),
                    }),
                    Some(active) => {
                        active.pull();
                        Ok(audio_processing::take_chunks(
                            &mut active.pending,
                            active.chunk_len,
                            false,
                        ))
                    }
                    None => Err(DomainError::NoActiveRecording),
                };
                let _ = reply.send(result);
            }
            CaptureCommand::Stop { reply } => {
                let result = match session.take() {
                    Some(mut active) => {
                        active.pull();
                        drop(active.stream);
                        let chunks = audio_processing::take_chunks(
                            &mut active.pending,
                            active.chunk_len,
                            true,
                        );
                        info!(chunks = chunks.len(), "Capture stopped");
                        Ok(chunks)
                    }
                    None => Err(DomainError::NoActiveRecording),
                };
                let _ = reply.send(result);
            }
            CaptureCommand::Shutdown => break,
        }
    }
    debug!("Capture thread shutting down");
}

/// cpal-based microphone capture.
///
/// Uses a dedicated thread to own the non-Send Stream type.
pub struct CpalAudioCapture {
    cmd_tx: mpsc::Sender<CaptureCommand>,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
}

impl CpalAudioCapture {
    pub fn new() -> Result<Self, DomainError> {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let device_lost = Arc::new(AtomicBool::new(false));

        let thread_handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || capture_thread_main(device_lost, cmd_rx))
            .map_err(|e| DomainError::AudioDevice {
                message: format!("Failed to spawn audio thread: {}", e),
            })?;

        info!("CpalAudioCapture initialized");
        Ok(Self {
            cmd_tx,
            thread_handle: Mutex::new(Some(thread_handle)),
        })
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> CaptureCommand,
    ) -> Result<T, DomainError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(make(reply_tx))
            .await
            .map_err(|_| DomainError::AudioDevice {
                message: "Audio thread not running".to_string(),
            })?;
        reply_rx.await.map_err(|_| DomainError::AudioDevice {
            message: "Audio thread did not respond".to_string(),
        })?
    }
}

impl Drop for CpalAudioCapture {
    fn drop(&mut self) {
        if self.cmd_tx.try_send(CaptureCommand::Shutdown).is_err() {
            warn!("Capture thread did not accept shutdown");
        }
        if let Some(handle) = self.thread_handle.lock().take() {
            let _ = handle.join();
        }
    }
}

#[async_trait]
impl AudioCapture for CpalAudioCapture {
    fn is_supported(&self) -> bool {
        audio_processing::default_device().is_ok()
    }

    async fn start(&self, constraints: &CaptureConstraints) -> Result<(), DomainError> {
        let constraints = constraints.clone();
        self.request(move |reply| CaptureCommand::Start { constraints, reply })
            .await
    }

    async fn drain(&self) -> Result<Vec<AudioChunk>, DomainError> {
        self.request(|reply| CaptureCommand::Drain { reply }).await
    }

    async fn stop(&self) -> Result<Vec<AudioChunk>, DomainError> {
        self.request(|reply| CaptureCommand::Stop { reply }).await
    }
}

#[cfg(test)]
mod tests {
    use super::audio_processing::*;

    #[test]
    fn test_resample_same_rate() {
        let samples = vec![100, 200, 300, 400];
        let result = resample(&samples, 48000, 48000);
        assert_eq!(result, samples);
    }

    #[test]
    fn test_resample_downsample() {
        let samples: Vec<i16> = (0..48).map(|i| i * 100).collect();
        let result = resample(&samples, 48000, 16000);
        assert!(result.len() >= 15 && result.len() <= 17);
    }

    #[test]
    fn test_to_mono_averages_frames() {
        assert_eq!(to_mono(&[100, 300, -50, 50], 2), vec![200, 0]);
        assert_eq!(to_mono(&[1, 2, 3], 1), vec![1, 2, 3]);
    }

    #[test]
    fn test_take_chunks_keeps_tail_until_flush() {
        let mut pending: Vec<i16> = (0..10).collect();
        let chunks = take_chunks(&mut pending, 4, false);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].samples(), &[4, 5, 6, 7]);
        assert_eq!(pending, vec![8, 9]);

        let chunks = take_chunks(&mut pending, 4, true);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].samples(), &[8, 9]);
        assert!(pending.is_empty());
    }
}
