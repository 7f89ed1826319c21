//! Multilingual voice interaction engine.
//!
//! Listens through the platform recognizer, matches spoken commands against
//! per-language phrase lists, answers in the same language and forwards
//! commands to the host application. Recorded audio can alternatively be
//! sent to a cloud transcription service and fed into the same pipeline.

#![forbid(unsafe_code)]

pub mod adapters;
pub mod app;
pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use app::{
    AppController, AssistantCommand, AssistantEvent, AssistantHandle, AssistantPorts,
    TranscriptSource, VoiceAssistant,
};
pub use domain::{CommandKind, DomainError, LanguageCatalog, LanguageProfile};
