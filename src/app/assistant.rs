//! The voice assistant orchestrator.
//!
//! [`VoiceAssistant`] owns every session object and is driven from a single
//! task: host commands arrive over an `mpsc` channel, platform notifications
//! over the ports' broadcast channels, and each is handled to completion
//! before the next one is looked at. That single thread of control is what
//! keeps recognition, synthesis and recording consistent without locks.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::app::recognition::RecognitionController;
use crate::app::recording::RecordingController;
use crate::app::synthesis::SpeechQueue;
use crate::domain::config::CloudConfig;
use crate::domain::{
    match_command, AppConfig, CaptureConstraints, CommandKind, DomainError, LanguageCatalog,
    LanguageProfile, MicrophoneArbiter, RecognitionEffect, RecognitionEvent, RecognitionPhase,
    ResponseKind, SynthesisEvent, VoiceResolver,
};
use crate::ports::{
    AudioCapture, CommandSink, SpeechRecognizer, SpeechSynthesizer, TranscribeConfig, Transcriber,
};

const EVENT_CAPACITY: usize = 64;
const COMMAND_CAPACITY: usize = 32;

/// Requests from the host application.
#[derive(Debug, Clone)]
pub enum AssistantCommand {
    SetListening(bool),
    ToggleListening,
    SetLanguage(String),
    /// Replace the assistant's settings while it runs.
    ApplyConfig(Box<AppConfig>),
    StartRecording,
    StopRecording,
    Shutdown,
}

/// Where a transcript came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptSource {
    /// Continuous platform recognition.
    Live,
    /// A recording sent to the transcription service.
    Cloud,
}

/// Status updates for the host UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum AssistantEvent {
    ListeningChanged(bool),
    LanguageChanged(String),
    TranscriptReceived {
        transcript: String,
        source: TranscriptSource,
    },
    Responded {
        kind: ResponseKind,
        text: String,
    },
    CommandDispatched(CommandKind),
    RecordingChanged(bool),
    Error(String),
}

/// Platform collaborators the assistant is built from.
///
/// `capture` and `transcriber` are only needed for the recording path.
pub struct AssistantPorts {
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub capture: Option<Arc<dyn AudioCapture>>,
    pub transcriber: Option<Arc<dyn Transcriber>>,
    pub host: Arc<dyn CommandSink>,
}

pub struct VoiceAssistant {
    catalog: Arc<LanguageCatalog>,
    profile: Arc<LanguageProfile>,
    recognition: RecognitionController,
    speech: SpeechQueue,
    recording: Option<RecordingController>,
    transcriber: Option<Arc<dyn Transcriber>>,
    host: Arc<dyn CommandSink>,
    cloud: CloudConfig,
    chunk_interval: Duration,
    listening: bool,
    /// Speak the welcome once the platform confirms the session.
    pending_welcome: bool,
    /// Start a new session as soon as the current one has ended.
    restart_after_stop: bool,
    events: broadcast::Sender<AssistantEvent>,
}

impl VoiceAssistant {
    /// Build the assistant.
    ///
    /// Fails with `CapabilityUnsupported` when the platform lacks speech
    /// recognition or synthesis; no session is created in that case.
    pub fn new(
        ports: AssistantPorts,
        catalog: Arc<LanguageCatalog>,
        config: &AppConfig,
    ) -> Result<Self, DomainError> {
        let arbiter = Arc::new(MicrophoneArbiter::new());
        let recognition = RecognitionController::new(
            ports.recognizer,
            Arc::clone(&arbiter),
            config.recognition.clone(),
        )?;
        let speech = SpeechQueue::new(
            ports.synthesizer,
            VoiceResolver::new(config.voice_selection.clone()),
            config.speech,
        )?;
        let constraints = config.recording.constraints();
        let chunk_interval = tick_period(&constraints);
        let recording = ports
            .capture
            .map(|capture| RecordingController::new(capture, arbiter, constraints));

        let profile = catalog.resolve(&config.language.active);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        info!(
            language = %profile.id,
            languages = catalog.len(),
            recording = recording.is_some(),
            "Voice assistant ready"
        );

        Ok(Self {
            catalog,
            profile,
            recognition,
            speech,
            recording,
            transcriber: ports.transcriber,
            host: ports.host,
            cloud: config.cloud.clone(),
            chunk_interval,
            listening: false,
            pending_welcome: false,
            restart_after_stop: false,
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AssistantEvent> {
        self.events.subscribe()
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn is_recording(&self) -> bool {
        self.recording.as_ref().is_some_and(|r| r.is_recording())
    }

    pub fn language(&self) -> &Arc<LanguageProfile> {
        &self.profile
    }

    pub fn recognition_phase(&self) -> RecognitionPhase {
        self.recognition.phase()
    }

    pub fn is_speaking(&self) -> bool {
        self.speech.is_speaking()
    }

    /// Turn listening on or off.
    ///
    /// Turning it off silences any speech and stops the session. Turning it
    /// on while the previous session is still winding down defers the start
    /// until that session has ended.
    pub async fn set_listening(&mut self, on: bool) -> Result<(), DomainError> {
        if on == self.listening {
            debug!(listening = on, "Listening unchanged");
            return Ok(());
        }

        if on {
            self.listening = true;
            self.emit(AssistantEvent::ListeningChanged(true));
            if self.recognition.phase().is_active() {
                debug!("Previous session still active, deferring start");
                self.restart_after_stop = true;
                return Ok(());
            }
            return self.start_recognition().await;
        }

        self.listening = false;
        self.pending_welcome = false;
        self.restart_after_stop = false;
        self.speech.cancel();
        self.emit(AssistantEvent::ListeningChanged(false));
        info!("Listening disabled");
        self.recognition.stop().await
    }

    pub async fn toggle_listening(&mut self) -> Result<(), DomainError> {
        self.set_listening(!self.listening).await
    }

    /// Switch the active language. A live session is stopped and restarted
    /// in the new locale.
    pub async fn set_language(&mut self, language: &str) -> Result<(), DomainError> {
        let profile = self.catalog.resolve(language);
        if profile.id == self.profile.id {
            debug!(language = %profile.id, "Language unchanged");
            return Ok(());
        }

        info!(from = %self.profile.id, to = %profile.id, "Switching language");
        self.profile = profile;
        self.emit(AssistantEvent::LanguageChanged(self.profile.id.clone()));

        if !self.listening {
            return Ok(());
        }
        match self.recognition.phase() {
            RecognitionPhase::Idle => self.start_recognition().await,
            phase if phase.can_stop() => {
                self.restart_after_stop = true;
                self.pending_welcome = false;
                self.recognition.stop().await
            }
            // A pending restart picks up the new locale; a failed session stays down
            phase => {
                debug!(?phase, "Session winding down, no restart scheduled");
                Ok(())
            }
        }
    }

    /// Apply new settings to a running assistant.
    ///
    /// Prosody and voice selection apply to the next utterance, recognition
    /// parameters to the next session, capture constraints to the next
    /// recording and cloud settings to the next transcription. A changed active language is switched as by
    /// [`set_language`](Self::set_language).
    pub async fn apply_config(&mut self, config: &AppConfig) -> Result<(), DomainError> {
        self.recognition.set_config(config.recognition.clone());
        self.speech.set_prosody(config.speech);
        self.speech.set_resolver(VoiceResolver::new(config.voice_selection.clone()));

        let constraints = config.recording.constraints();
        self.chunk_interval = tick_period(&constraints);
        if let Some(recorder) = self.recording.as_mut() {
            recorder.set_constraints(constraints);
        }
        self.cloud = config.cloud.clone();
        info!("Assistant settings applied");

        self.set_language(&config.language.active).await
    }

    pub async fn handle_recognition_event(&mut self, event: &RecognitionEvent) {
        let effect = match self.recognition.handle_event(event) {
            Ok(effect) => effect,
            Err(e) => {
                warn!(error = %e, "Ignoring recognition event");
                return;
            }
        };

        match effect {
            RecognitionEffect::Activated => {
                if std::mem::take(&mut self.pending_welcome) {
                    self.respond(ResponseKind::Welcome).await;
                }
            }
            RecognitionEffect::Transcript(transcript) => {
                self.process_transcript(&transcript, TranscriptSource::Live)
                    .await;
            }
            RecognitionEffect::Failed(code) => {
                let err = code.to_error();
                self.emit(AssistantEvent::Error(err.to_string()));
                if matches!(err, DomainError::MicrophonePermissionDenied) {
                    self.revert_listening();
                }
            }
            RecognitionEffect::Ended { .. } => {
                self.pending_welcome = false;
                if std::mem::take(&mut self.restart_after_stop) && self.listening {
                    if let Err(e) = self.start_recognition().await {
                        self.emit(AssistantEvent::Error(e.to_string()));
                    }
                } else if self.listening {
                    // Never restart on our own; the user has to re-enable
                    self.revert_listening();
                }
            }
            RecognitionEffect::Ignored => {}
        }
    }

    pub async fn handle_synthesis_event(&mut self, event: &SynthesisEvent) {
        self.speech.handle_event(event).await;
    }

    /// Match a transcript, answer it and notify the host.
    ///
    /// Live recognition and cloud transcription both end up here.
    pub async fn process_transcript(
        &mut self,
        transcript: &str,
        source: TranscriptSource,
    ) -> Option<CommandKind> {
        self.emit(AssistantEvent::TranscriptReceived {
            transcript: transcript.to_string(),
            source,
        });

        let command = match_command(transcript, &self.profile.commands);
        info!(
            language = %self.profile.id,
            ?source,
            command = command.map(|c| c.as_str()).unwrap_or("none"),
            "Transcript processed"
        );

        self.respond(ResponseKind::for_command(command)).await;

        if let Some(command) = command.filter(CommandKind::is_forwarded) {
            self.host.on_command(command);
            self.emit(AssistantEvent::CommandDispatched(command));
        }
        command
    }

    pub async fn start_recording(&mut self) -> Result<(), DomainError> {
        let recorder = self
            .recording
            .as_mut()
            .ok_or(DomainError::CapabilityUnsupported {
                capability: "audio capture",
            })?;
        recorder.start().await?;
        self.emit(AssistantEvent::RecordingChanged(true));
        Ok(())
    }

    /// Pull pending audio from the capture device into the recording.
    pub async fn collect_recording(&mut self) {
        if let Some(recorder) = self.recording.as_mut() {
            if let Err(e) = recorder.collect().await {
                warn!(error = %e, "Failed to collect audio");
            }
        }
    }

    /// Stop recording, transcribe the audio and process the text.
    pub async fn stop_recording(&mut self) -> Result<Option<CommandKind>, DomainError> {
        let recorder = self
            .recording
            .as_mut()
            .ok_or(DomainError::NoActiveRecording)?;
        let buffer = recorder.stop().await?;
        self.emit(AssistantEvent::RecordingChanged(false));

        let transcriber = self
            .transcriber
            .clone()
            .ok_or(DomainError::CapabilityUnsupported {
                capability: "cloud transcription",
            })?;
        let config = TranscribeConfig {
            language: Some(self.profile.id.clone()),
            model: self.cloud.transcription_model.clone(),
            temperature: self.cloud.temperature,
        };

        let result = transcriber.transcribe(&buffer, &config).await?;
        let transcript = result.text.trim();
        if transcript.is_empty() {
            debug!("Transcription returned no text");
            return Ok(None);
        }
        Ok(self
            .process_transcript(transcript, TranscriptSource::Cloud)
            .await)
    }

    /// Silence speech, abort any recording and ask the platform to end the
    /// recognition session. The assistant can be re-enabled afterwards; a
    /// start requested before the platform confirms the end is deferred
    /// until it does.
    pub async fn shutdown(&mut self) {
        self.listening = false;
        self.pending_welcome = false;
        self.restart_after_stop = false;
        self.speech.cancel();
        self.recognition.abort().await;
        if let Some(recorder) = self.recording.as_mut() {
            recorder.abort().await;
        }
        info!("Voice assistant shut down");
    }

    /// Apply one host command, reporting failures as events.
    pub async fn execute(&mut self, command: AssistantCommand) {
        debug!(?command, "Executing command");
        let result = match command {
            AssistantCommand::SetListening(on) => self.set_listening(on).await,
            AssistantCommand::ToggleListening => self.toggle_listening().await,
            AssistantCommand::SetLanguage(language) => self.set_language(&language).await,
            AssistantCommand::ApplyConfig(config) => self.apply_config(&config).await,
            AssistantCommand::StartRecording => self.start_recording().await,
            AssistantCommand::StopRecording => self.stop_recording().await.map(|_| ()),
            AssistantCommand::Shutdown => {
                self.shutdown().await;
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!(error = %e, "Command failed");
            self.emit(AssistantEvent::Error(e.to_string()));
        }
    }

    /// Drive the assistant until `Shutdown` arrives or every handle is gone.
    pub async fn run(mut self, mut commands: mpsc::Receiver<AssistantCommand>) {
        let mut recognition_events = self.recognition.subscribe();
        let mut synthesis_events = self.speech.subscribe();
        let mut ticker = tokio::time::interval(self.chunk_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Voice assistant running");
        loop {
            tokio::select! {
                // Platform notifications first, so commands see current session state
                biased;

                event = recognition_events.recv() => match event {
                    Ok(event) => self.handle_recognition_event(&event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Recognition events dropped");
                    }
                    Err(RecvError::Closed) => {
                        error!("Recognizer event channel closed");
                        break;
                    }
                },
                event = synthesis_events.recv() => match event {
                    Ok(event) => self.handle_synthesis_event(&event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Synthesis events dropped");
                    }
                    Err(RecvError::Closed) => {
                        error!("Synthesizer event channel closed");
                        break;
                    }
                },
                command = commands.recv() => match command {
                    Some(AssistantCommand::Shutdown) | None => break,
                    Some(command) => {
                        self.execute(command).await;
                        if ticker.period() != self.chunk_interval {
                            ticker = tokio::time::interval(self.chunk_interval);
                            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                        }
                    }
                },
                _ = ticker.tick(), if self.is_recording() => {
                    self.collect_recording().await;
                }
            }
        }

        self.shutdown().await;
    }

    /// Run the assistant on its own task.
    pub fn spawn(self) -> (AssistantHandle, JoinHandle<()>) {
        let (commands, receiver) = mpsc::channel(COMMAND_CAPACITY);
        let handle = AssistantHandle {
            commands,
            events: self.events.clone(),
        };
        let task = tokio::spawn(self.run(receiver));
        (handle, task)
    }

    async fn start_recognition(&mut self) -> Result<(), DomainError> {
        let locale = self.profile.speech_locale.clone();
        match self.recognition.start(&locale).await {
            Ok(()) => {
                self.pending_welcome = true;
                info!(locale = %locale, "Listening enabled");
                Ok(())
            }
            Err(e) => {
                self.revert_listening();
                Err(e)
            }
        }
    }

    async fn respond(&mut self, kind: ResponseKind) {
        let text = self.profile.response(kind).to_string();
        let profile = Arc::clone(&self.profile);
        self.speech.speak(&text, &profile).await;
        self.emit(AssistantEvent::Responded { kind, text });
    }

    fn revert_listening(&mut self) {
        self.pending_welcome = false;
        self.restart_after_stop = false;
        if self.listening {
            self.listening = false;
            self.emit(AssistantEvent::ListeningChanged(false));
        }
    }

    fn emit(&self, event: AssistantEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

fn tick_period(constraints: &CaptureConstraints) -> Duration {
    Duration::from_millis(u64::from(constraints.chunk_interval_ms.max(1)))
}

/// Cloneable handle to a spawned [`VoiceAssistant`].
#[derive(Clone)]
pub struct AssistantHandle {
    commands: mpsc::Sender<AssistantCommand>,
    events: broadcast::Sender<AssistantEvent>,
}

impl AssistantHandle {
    pub async fn send(
        &self,
        command: AssistantCommand,
    ) -> Result<(), mpsc::error::SendError<AssistantCommand>> {
        self.commands.send(command).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AssistantEvent> {
        self.events.subscribe()
    }

    /// Ask the assistant to stop. Returns false if it already has.
    pub async fn shutdown(&self) -> bool {
        self.commands.send(AssistantCommand::Shutdown).await.is_ok()
    }
}
