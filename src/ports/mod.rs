pub mod capture;
pub mod config;
pub mod host;
pub mod http;
pub mod recognizer;
pub mod synthesizer;
pub mod transcriber;

pub use capture::AudioCapture;
pub use config::ConfigStore;
pub use host::CommandSink;
pub use http::{FilePart, HttpClient, MultipartForm};
pub use recognizer::{RecognitionRequest, SpeechRecognizer};
pub use synthesizer::SpeechSynthesizer;
pub use transcriber::{TranscribeConfig, Transcriber, TranscriptionResult};
