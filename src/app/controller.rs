use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

use crate::adapters::{CloudSpeechClient, PrivacyGuard, TomlConfigStore};
use crate::app::assistant::{AssistantPorts, VoiceAssistant};
use crate::domain::{AppConfig, DomainError, LanguageCatalog};
use crate::infrastructure::init_logging;
use crate::ports::{ConfigStore, HttpClient, Transcriber};

/// Application controller that orchestrates initialization and owns the
/// process-wide services.
pub struct AppController {
    config: RwLock<AppConfig>,
    config_store: Arc<TomlConfigStore>,
    privacy_guard: Arc<PrivacyGuard>,
    catalog: RwLock<Arc<LanguageCatalog>>,
    cloud: Arc<CloudSpeechClient<PrivacyGuard>>,
    _log_guard: Option<WorkerGuard>,
}

impl AppController {
    /// Initialize the application controller.
    /// This sets up configuration, logging, the privacy guard and the
    /// language catalog.
    pub fn new() -> Result<Self, DomainError> {
        // Step 1: Initialize config store
        let config_store = TomlConfigStore::new()?;

        // Step 2: Load configuration
        let config = config_store.load()?;

        // Step 3: Initialize logging
        let log_guard = init_logging(&config_store.logs_dir(), &config.logging)?;

        info!("Medini Voice starting up");

        Self::assemble(config_store, config, log_guard)
    }

    /// Build a controller over an existing store without installing a
    /// global subscriber.
    pub fn with_store(config_store: TomlConfigStore) -> Result<Self, DomainError> {
        let config = config_store.load()?;
        Self::assemble(config_store, config, None)
    }

    fn assemble(
        config_store: TomlConfigStore,
        config: AppConfig,
        log_guard: Option<WorkerGuard>,
    ) -> Result<Self, DomainError> {
        // Step 4: Initialize PrivacyGuard with config settings
        let privacy_guard = Arc::new(PrivacyGuard::new(&config.privacy)?);

        // Step 5: Language profiles, built-in plus local overrides
        let catalog = Arc::new(Self::load_catalog(&config)?);

        let cloud = Arc::new(CloudSpeechClient::new(
            Arc::clone(&privacy_guard),
            config.cloud.clone(),
        )?);

        info!(
            local_only = config.privacy.local_only,
            language = %config.language.active,
            languages = catalog.len(),
            "AppController initialized"
        );

        Ok(Self {
            config: RwLock::new(config),
            config_store: Arc::new(config_store),
            privacy_guard,
            catalog: RwLock::new(catalog),
            cloud,
            _log_guard: log_guard,
        })
    }

    fn load_catalog(config: &AppConfig) -> Result<LanguageCatalog, DomainError> {
        let builtin = LanguageCatalog::builtin()?;
        match &config.language.profiles_path {
            Some(path) => Ok(builtin.merged(&LanguageCatalog::load(path)?)),
            None => Ok(builtin.clone()),
        }
    }

    /// Get the current configuration.
    pub fn config(&self) -> AppConfig {
        self.config.read().clone()
    }

    /// Update the configuration.
    ///
    /// Applies to services owned by the controller and to assistants built
    /// afterwards. Send [`AssistantCommand::ApplyConfig`] to update one that
    /// is already running.
    ///
    /// [`AssistantCommand::ApplyConfig`]: crate::app::assistant::AssistantCommand::ApplyConfig
    pub fn update_config(&self, config: AppConfig) -> Result<(), DomainError> {
        // Validate profiles before anything is changed
        let catalog = Self::load_catalog(&config)?;

        // Update PrivacyGuard settings
        self.privacy_guard.apply(&config.privacy);
        self.cloud.set_config(config.cloud.clone());
        *self.catalog.write() = Arc::new(catalog);

        // Save to disk
        self.config_store.save(&config)?;

        // Update in-memory config
        *self.config.write() = config;

        info!("Configuration updated");
        Ok(())
    }

    /// Check if network is currently blocked.
    pub fn is_network_blocked(&self) -> bool {
        self.privacy_guard.is_network_blocked()
    }

    pub fn catalog(&self) -> Arc<LanguageCatalog> {
        self.catalog.read().clone()
    }

    /// Cloud transcription and synthesis client, routed through the
    /// privacy guard.
    pub fn cloud_speech(&self) -> Arc<CloudSpeechClient<PrivacyGuard>> {
        Arc::clone(&self.cloud)
    }

    /// Build an assistant from platform ports and the current settings.
    ///
    /// Without an explicit transcriber the cloud client is used.
    pub fn build_assistant(&self, mut ports: AssistantPorts) -> Result<VoiceAssistant, DomainError> {
        if ports.transcriber.is_none() {
            ports.transcriber = Some(self.cloud_speech() as Arc<dyn Transcriber>);
        }
        VoiceAssistant::new(ports, self.catalog(), &self.config())
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> String {
        self.config_store.data_dir().to_string_lossy().to_string()
    }

    /// Get the logs directory path.
    pub fn logs_dir(&self) -> String {
        self.config_store.logs_dir().to_string_lossy().to_string()
    }

    /// Get the config file path.
    pub fn config_path(&self) -> String {
        self.config_store.config_path().to_string_lossy().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{FakeRecognizer, FakeSynthesizer, RecordingSink};
    use std::fs;
    use tempfile::TempDir;

    fn controller(dir: &TempDir) -> AppController {
        let store = TomlConfigStore::with_data_dir(dir.path().to_path_buf()).unwrap();
        AppController::with_store(store).unwrap()
    }

    #[test]
    fn test_defaults_block_network() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir);

        assert!(controller.is_network_blocked());
        assert_eq!(controller.catalog().len(), 12);
        assert!(controller.config_path().ends_with("config.toml"));
    }

    #[test]
    fn test_update_config_applies_and_persists() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir);

        let mut config = controller.config();
        config.privacy.local_only = false;
        config.language.active = "ta".to_string();
        controller.update_config(config).unwrap();

        assert!(!controller.is_network_blocked());
        let reloaded = self::controller(&dir);
        assert_eq!(reloaded.config().language.active, "ta");
        assert!(!reloaded.is_network_blocked());
    }

    #[test]
    fn test_profile_overrides_merged() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir);

        let path = dir.path().join("profiles.toml");
        let builtin = fs::read_to_string(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/src/domain/profiles.toml"
        ))
        .unwrap();
        // Re-declare English under a new identifier
        let extra = builtin
            .split("[[language]]")
            .nth(1)
            .unwrap()
            .replacen("id = 'en'", "id = 'ur'", 1)
            .replacen("speech_locale = 'en-US'", "speech_locale = 'ur-IN'", 1);
        fs::write(&path, format!("[[language]]{}", extra)).unwrap();

        let mut config = controller.config();
        config.language.profiles_path = Some(path);
        controller.update_config(config).unwrap();

        let catalog = controller.catalog();
        assert_eq!(catalog.len(), 13);
        assert_eq!(catalog.resolve("ur-IN").speech_locale, "ur-IN");
    }

    #[test]
    fn test_invalid_profiles_rejected_without_changes() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir);

        let path = dir.path().join("broken.toml");
        fs::write(&path, "[[language]]\nid = 'xx'\n").unwrap();

        let mut config = controller.config();
        config.privacy.local_only = false;
        config.language.profiles_path = Some(path);
        assert!(controller.update_config(config).is_err());
        assert!(controller.is_network_blocked());
        assert!(controller.config().language.profiles_path.is_none());
    }

    #[tokio::test]
    async fn test_build_assistant_uses_active_language() {
        let dir = TempDir::new().unwrap();
        let controller = controller(&dir);
        let mut config = controller.config();
        config.language.active = "kn".to_string();
        controller.update_config(config).unwrap();

        let assistant = controller
            .build_assistant(AssistantPorts {
                recognizer: Arc::new(FakeRecognizer::new()),
                synthesizer: Arc::new(FakeSynthesizer::with_voices(Vec::new())),
                capture: None,
                transcriber: None,
                host: Arc::new(RecordingSink::default()),
            })
            .unwrap();
        assert_eq!(assistant.language().speech_locale, "kn-IN");
    }
}
