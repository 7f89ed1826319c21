use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::DomainError;

/// Identifier used when a requested language has no profile.
pub const DEFAULT_LANGUAGE: &str = "en";

const BUILTIN_PROFILES: &str = include_str!("profiles.toml");

static BUILTIN: OnceCell<LanguageCatalog> = OnceCell::new();

/// A command the user can speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Start,
    Next,
    Back,
    Help,
}

impl CommandKind {
    /// Fixed evaluation order used when matching transcripts.
    pub const ALL: [CommandKind; 4] = [
        CommandKind::Start,
        CommandKind::Next,
        CommandKind::Back,
        CommandKind::Help,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Start => "start",
            CommandKind::Next => "next",
            CommandKind::Back => "back",
            CommandKind::Help => "help",
        }
    }

    /// Whether the host application is notified of this command.
    ///
    /// `Help` is answered entirely by the engine.
    pub fn is_forwarded(&self) -> bool {
        !matches!(self, CommandKind::Help)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A canned response spoken back to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Welcome,
    Starting,
    Next,
    Back,
    Help,
    NotUnderstood,
}

impl ResponseKind {
    /// Response for the outcome of command matching.
    pub fn for_command(command: Option<CommandKind>) -> Self {
        match command {
            Some(CommandKind::Start) => ResponseKind::Starting,
            Some(CommandKind::Next) => ResponseKind::Next,
            Some(CommandKind::Back) => ResponseKind::Back,
            Some(CommandKind::Help) => ResponseKind::Help,
            None => ResponseKind::NotUnderstood,
        }
    }
}

/// Delivery style for cloud-synthesized speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceMode {
    #[default]
    Normal,
    Emergency,
}

/// Accepted phrases per command kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandLexicon {
    pub start: Vec<String>,
    pub next: Vec<String>,
    pub back: Vec<String>,
    pub help: Vec<String>,
}

impl CommandLexicon {
    pub fn phrases(&self, kind: CommandKind) -> &[String] {
        match kind {
            CommandKind::Start => &self.start,
            CommandKind::Next => &self.next,
            CommandKind::Back => &self.back,
            CommandKind::Help => &self.help,
        }
    }
}

/// Canned response strings for one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Responses {
    pub welcome: String,
    pub starting: String,
    pub next: String,
    pub back: String,
    pub help: String,
    pub not_understood: String,
}

impl Responses {
    pub fn get(&self, kind: ResponseKind) -> &str {
        match kind {
            ResponseKind::Welcome => &self.welcome,
            ResponseKind::Starting => &self.starting,
            ResponseKind::Next => &self.next,
            ResponseKind::Back => &self.back,
            ResponseKind::Help => &self.help,
            ResponseKind::NotUnderstood => &self.not_understood,
        }
    }

    fn all(&self) -> [(ResponseKind, &str); 6] {
        [
            (ResponseKind::Welcome, &self.welcome),
            (ResponseKind::Starting, &self.starting),
            (ResponseKind::Next, &self.next),
            (ResponseKind::Back, &self.back),
            (ResponseKind::Help, &self.help),
            (ResponseKind::NotUnderstood, &self.not_understood),
        ]
    }
}

/// Cloud neural voices for the two delivery modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NeuralVoices {
    pub normal: String,
    pub emergency: String,
}

impl NeuralVoices {
    pub fn for_mode(&self, mode: VoiceMode) -> &str {
        match mode {
            VoiceMode::Normal => &self.normal,
            VoiceMode::Emergency => &self.emergency,
        }
    }
}

/// Everything the engine needs to listen and speak in one language.
///
/// Profiles are immutable once loaded and validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LanguageProfile {
    /// Short identifier, e.g. `hi`.
    pub id: String,
    /// BCP-47 locale used for recognition and synthesis, e.g. `hi-IN`.
    pub speech_locale: String,
    /// English and native-script names of the language, lowercase.
    pub language_names: Vec<String>,
    /// Platform voice names to try, in order.
    pub preferred_voice_names: Vec<String>,
    /// Keywords marking a preferred voice among exact-locale voices.
    pub voice_keywords: Vec<String>,
    pub commands: CommandLexicon,
    pub responses: Responses,
    #[serde(default)]
    pub neural_voices: Option<NeuralVoices>,
}

impl LanguageProfile {
    pub fn response(&self, kind: ResponseKind) -> &str {
        self.responses.get(kind)
    }

    /// Check the profile for fields that would silently degrade at runtime.
    pub fn validate(&self) -> Result<(), DomainError> {
        let invalid = |reason: String| DomainError::InvalidProfile {
            language: self.id.clone(),
            reason,
        };

        if self.id.trim().is_empty() {
            return Err(invalid("empty identifier".to_string()));
        }
        if !is_valid_locale(&self.speech_locale) {
            return Err(invalid(format!(
                "malformed speech locale '{}'",
                self.speech_locale
            )));
        }
        if self.language_names.is_empty() {
            return Err(invalid("no language names".to_string()));
        }
        for kind in CommandKind::ALL {
            let phrases = self.commands.phrases(kind);
            if phrases.is_empty() || phrases.iter().any(|p| p.trim().is_empty()) {
                return Err(invalid(format!("empty phrase list for '{}'", kind)));
            }
        }
        for (kind, text) in self.responses.all() {
            if text.trim().is_empty() {
                return Err(invalid(format!("empty response for {:?}", kind)));
            }
        }
        Ok(())
    }
}

fn is_valid_locale(locale: &str) -> bool {
    let mut parts = locale.split('-');
    let (Some(lang), Some(region), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    (2..=3).contains(&lang.len())
        && lang.chars().all(|c| c.is_ascii_lowercase())
        && region.len() == 2
        && region.chars().all(|c| c.is_ascii_uppercase())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(rename = "language")]
    languages: Vec<LanguageProfile>,
}

/// Validated set of language profiles.
#[derive(Debug, Clone)]
pub struct LanguageCatalog {
    profiles: Vec<Arc<LanguageProfile>>,
    fallback: Arc<LanguageProfile>,
}

impl LanguageCatalog {
    /// The catalog shipped with the engine, parsed once per process.
    pub fn builtin() -> Result<&'static LanguageCatalog, DomainError> {
        BUILTIN.get_or_try_init(|| Self::from_toml_str(BUILTIN_PROFILES))
    }

    /// Parse and validate a catalog from a TOML document of
    /// `[[language]]` tables.
    pub fn from_toml_str(content: &str) -> Result<Self, DomainError> {
        let file: CatalogFile = toml::from_str(content)?;
        Self::from_profiles(file.languages)
    }

    /// Load a catalog file from disk.
    pub fn load(path: &Path) -> Result<Self, DomainError> {
        debug!(path = ?path, "Loading language profiles");
        let content = fs::read_to_string(path)?;
        let catalog = Self::from_toml_str(&content)?;
        info!(path = ?path, count = catalog.len(), "Language profiles loaded");
        Ok(catalog)
    }

    pub fn from_profiles(profiles: Vec<LanguageProfile>) -> Result<Self, DomainError> {
        let mut validated: Vec<Arc<LanguageProfile>> = Vec::with_capacity(profiles.len());
        for profile in profiles {
            profile.validate()?;
            if validated.iter().any(|p| p.id == profile.id) {
                return Err(DomainError::InvalidProfile {
                    language: profile.id,
                    reason: "duplicate identifier".to_string(),
                });
            }
            validated.push(Arc::new(profile));
        }

        let fallback = validated
            .iter()
            .find(|p| p.id == DEFAULT_LANGUAGE)
            .or_else(|| validated.first())
            .cloned()
            .ok_or_else(|| DomainError::Config("Language catalog is empty".to_string()))?;

        Ok(Self {
            profiles: validated,
            fallback,
        })
    }

    /// Return a catalog where profiles from `overrides` replace profiles with
    /// the same identifier and new identifiers are appended.
    pub fn merged(&self, overrides: &LanguageCatalog) -> Self {
        let mut profiles = self.profiles.clone();
        for profile in &overrides.profiles {
            match profiles.iter_mut().find(|p| p.id == profile.id) {
                Some(existing) => *existing = Arc::clone(profile),
                None => profiles.push(Arc::clone(profile)),
            }
        }
        let fallback = profiles
            .iter()
            .find(|p| p.id == self.fallback.id)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback));
        Self { profiles, fallback }
    }

    /// Look up a profile by identifier. Accepts `hi` as well as `hi-IN`.
    pub fn get(&self, language: &str) -> Option<Arc<LanguageProfile>> {
        let id = normalize_language_id(language);
        self.profiles.iter().find(|p| p.id == id).cloned()
    }

    /// Like [`get`](Self::get), falling back to the default profile.
    pub fn resolve(&self, language: &str) -> Arc<LanguageProfile> {
        self.get(language).unwrap_or_else(|| {
            debug!(
                language,
                fallback = %self.fallback.id,
                "No profile for language, using fallback"
            );
            Arc::clone(&self.fallback)
        })
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.profiles.iter().map(|p| p.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

fn normalize_language_id(language: &str) -> String {
    language
        .trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}
