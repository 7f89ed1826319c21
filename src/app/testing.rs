//! Hand-written port fakes shared by the controller tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::domain::{
    AudioBuffer, AudioChunk, CaptureConstraints, CommandKind, DomainError, RecognitionEvent,
    SynthesisEvent, UtteranceRequest, VoiceDescriptor,
};
use crate::ports::{
    AudioCapture, CommandSink, RecognitionRequest, SpeechRecognizer, SpeechSynthesizer,
    TranscribeConfig, Transcriber, TranscriptionResult,
};

pub struct FakeRecognizer {
    supported: bool,
    fail_start: AtomicBool,
    fail_stop: AtomicBool,
    requests: Mutex<Vec<RecognitionRequest>>,
    stops: AtomicUsize,
    events: broadcast::Sender<RecognitionEvent>,
}

impl FakeRecognizer {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            supported: true,
            fail_start: AtomicBool::new(false),
            fail_stop: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
            events,
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    pub fn fail_next_start(&self) {
        self.fail_start.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_stop(&self) {
        self.fail_stop.store(true, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<RecognitionRequest> {
        self.requests.lock().clone()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn emit(&self, event: RecognitionEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl SpeechRecognizer for FakeRecognizer {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn start(&self, request: &RecognitionRequest) -> Result<(), DomainError> {
        if self.fail_start.swap(false, Ordering::SeqCst) {
            return Err(DomainError::Recognition("device busy".to_string()));
        }
        self.requests.lock().push(request.clone());
        Ok(())
    }

    async fn stop(&self) -> Result<(), DomainError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop.swap(false, Ordering::SeqCst) {
            return Err(DomainError::Recognition("device lost".to_string()));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<RecognitionEvent> {
        self.events.subscribe()
    }
}

pub struct FakeSynthesizer {
    supported: bool,
    loaded: AtomicBool,
    voices: Mutex<Vec<VoiceDescriptor>>,
    spoken: Mutex<Vec<UtteranceRequest>>,
    cancels: AtomicUsize,
    events: broadcast::Sender<SynthesisEvent>,
}

impl FakeSynthesizer {
    pub fn with_voices(voices: Vec<VoiceDescriptor>) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            supported: true,
            loaded: AtomicBool::new(true),
            voices: Mutex::new(voices),
            spoken: Mutex::new(Vec::new()),
            cancels: AtomicUsize::new(0),
            events,
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::with_voices(Vec::new())
        }
    }

    /// A synthesizer whose voice catalog has not arrived yet.
    pub fn loading() -> Self {
        let synth = Self::with_voices(Vec::new());
        synth.loaded.store(false, Ordering::SeqCst);
        synth
    }

    pub fn load_voices(&self, voices: Vec<VoiceDescriptor>) {
        *self.voices.lock() = voices;
        self.loaded.store(true, Ordering::SeqCst);
    }

    pub fn spoken(&self) -> Vec<UtteranceRequest> {
        self.spoken.lock().clone()
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn emit(&self, event: SynthesisEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn voices(&self) -> Vec<VoiceDescriptor> {
        self.voices.lock().clone()
    }

    fn voices_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    async fn speak(&self, utterance: &UtteranceRequest) -> Result<(), DomainError> {
        self.spoken.lock().push(utterance.clone());
        Ok(())
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }

    fn subscribe(&self) -> broadcast::Receiver<SynthesisEvent> {
        self.events.subscribe()
    }
}

pub struct FakeCapture {
    supported: bool,
    queued: Mutex<VecDeque<AudioChunk>>,
    tail: Mutex<Vec<AudioChunk>>,
    starts: Mutex<Vec<CaptureConstraints>>,
    running: AtomicBool,
}

impl FakeCapture {
    pub fn new() -> Self {
        Self {
            supported: true,
            queued: Mutex::new(VecDeque::new()),
            tail: Mutex::new(Vec::new()),
            starts: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    /// Queue a chunk handed over on the next drain.
    pub fn queue(&self, samples: Vec<i16>) {
        self.queued.lock().push_back(AudioChunk::new(samples));
    }

    /// Queue a chunk that only appears when capture stops.
    pub fn queue_tail(&self, samples: Vec<i16>) {
        self.tail.lock().push(AudioChunk::new(samples));
    }

    pub fn start_count(&self) -> usize {
        self.starts.lock().len()
    }

    /// Constraints passed to the most recent start.
    pub fn last_constraints(&self) -> Option<CaptureConstraints> {
        self.starts.lock().last().cloned()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioCapture for FakeCapture {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn start(&self, constraints: &CaptureConstraints) -> Result<(), DomainError> {
        self.starts.lock().push(constraints.clone());
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn drain(&self) -> Result<Vec<AudioChunk>, DomainError> {
        Ok(self.queued.lock().drain(..).collect())
    }

    async fn stop(&self) -> Result<Vec<AudioChunk>, DomainError> {
        self.running.store(false, Ordering::SeqCst);
        let mut chunks: Vec<AudioChunk> = self.queued.lock().drain(..).collect();
        chunks.append(&mut *self.tail.lock());
        Ok(chunks)
    }
}

pub struct FakeTranscriber {
    reply: Result<String, String>,
    calls: Mutex<Vec<(usize, TranscribeConfig)>>,
}

impl FakeTranscriber {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sample count and config of every transcription request.
    pub fn calls(&self) -> Vec<(usize, TranscribeConfig)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(
        &self,
        audio: &AudioBuffer,
        config: &TranscribeConfig,
    ) -> Result<TranscriptionResult, DomainError> {
        self.calls.lock().push((audio.len(), config.clone()));
        match &self.reply {
            Ok(text) => Ok(TranscriptionResult {
                text: text.clone(),
                language: config.language.clone(),
                duration_ms: 1,
                audio_digest: String::new(),
            }),
            Err(message) => Err(DomainError::TranscriptionNetworkFailure(message.clone())),
        }
    }
}

/// Records every command the engine forwards to the host.
#[derive(Default)]
pub struct RecordingSink {
    commands: Mutex<Vec<CommandKind>>,
}

impl RecordingSink {
    pub fn commands(&self) -> Vec<CommandKind> {
        self.commands.lock().clone()
    }
}

impl CommandSink for RecordingSink {
    fn on_command(&self, command: CommandKind) {
        self.commands.lock().push(command);
    }
}
