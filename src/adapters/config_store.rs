use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::domain::{AppConfig, DomainError};
use crate::ports::ConfigStore;

/// TOML-based configuration store with OS-specific paths.
pub struct TomlConfigStore {
    data_dir: PathBuf,
    logs_dir: PathBuf,
}

impl TomlConfigStore {
    /// Create a new TomlConfigStore.
    /// Uses OS-specific application data directories.
    pub fn new() -> Result<Self, DomainError> {
        let data_dir = Self::get_data_dir()?;

        // Ensure the data directory exists
        fs::create_dir_all(&data_dir)?;

        let logs_dir = Self::default_logs_dir(&data_dir);
        info!(data_dir = ?data_dir, "ConfigStore initialized");

        Ok(Self { data_dir, logs_dir })
    }

    /// Create a store rooted at an explicit directory, with logs kept in
    /// its `logs` subdirectory.
    pub fn with_data_dir(data_dir: PathBuf) -> Result<Self, DomainError> {
        fs::create_dir_all(&data_dir)?;
        debug!(data_dir = ?data_dir, "ConfigStore initialized");
        Ok(Self {
            logs_dir: data_dir.join("logs"),
            data_dir,
        })
    }

    /// Get the OS-specific application data directory.
    /// - macOS: ~/Library/Application Support/MediniVoice/
    /// - Windows: %APPDATA%\MediniVoice\
    /// - Linux: ~/.config/MediniVoice/
    fn get_data_dir() -> Result<PathBuf, DomainError> {
        #[cfg(target_os = "macos")]
        {
            dirs::data_dir()
                .map(|p| p.join("MediniVoice"))
                .ok_or_else(|| DomainError::Config("Could not find application data directory".to_string()))
        }

        #[cfg(target_os = "windows")]
        {
            dirs::config_dir()
                .map(|p| p.join("MediniVoice"))
                .ok_or_else(|| DomainError::Config("Could not find application data directory".to_string()))
        }

        #[cfg(target_os = "linux")]
        {
            dirs::config_dir()
                .map(|p| p.join("MediniVoice"))
                .ok_or_else(|| DomainError::Config("Could not find application data directory".to_string()))
        }

        #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
        {
            Err(DomainError::Config("Unsupported operating system".to_string()))
        }
    }

    /// Get the OS-specific log directory.
    /// - macOS: ~/Library/Application Support/MediniVoice/logs/
    /// - Windows: %LOCALAPPDATA%\MediniVoice\logs\
    /// - Linux: ~/.local/share/MediniVoice/logs/
    fn default_logs_dir(data_dir: &Path) -> PathBuf {
        #[cfg(target_os = "macos")]
        {
            data_dir.join("logs")
        }

        #[cfg(target_os = "windows")]
        {
            dirs::data_local_dir()
                .map(|p| p.join("MediniVoice").join("logs"))
                .unwrap_or_else(|| data_dir.join("logs"))
        }

        #[cfg(target_os = "linux")]
        {
            dirs::data_dir()
                .map(|p| p.join("MediniVoice").join("logs"))
                .unwrap_or_else(|| data_dir.join("logs"))
        }

        #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
        {
            data_dir.join("logs")
        }
    }
}

impl ConfigStore for TomlConfigStore {
    fn load(&self) -> Result<AppConfig, DomainError> {
        let config_path = self.config_path();

        if config_path.exists() {
            debug!(path = ?config_path, "Loading configuration");
            let content = fs::read_to_string(&config_path)?;
            let config: AppConfig = toml::from_str(&content)?;
            info!(path = ?config_path, "Configuration loaded");
            Ok(config)
        } else {
            info!(path = ?config_path, "Configuration file not found, creating default");
            let config = AppConfig::new();
            self.save(&config)?;
            Ok(config)
        }
    }

    fn save(&self, config: &AppConfig) -> Result<(), DomainError> {
        let config_path = self.config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        fs::write(&config_path, content)?;

        info!(path = ?config_path, "Configuration saved");
        Ok(())
    }

    fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }

    fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    fn logs_dir(&self) -> PathBuf {
        self.logs_dir.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_store_paths() {
        let temp_dir = TempDir::new().unwrap();
        let store = TomlConfigStore::with_data_dir(temp_dir.path().to_path_buf()).unwrap();

        assert!(store.config_path().ends_with("config.toml"));
        assert!(store.config_path().starts_with(temp_dir.path()));
        assert!(store.logs_dir().to_string_lossy().contains("logs"));
    }

    #[test]
    fn test_first_load_creates_default() {
        let temp_dir = TempDir::new().unwrap();
        let store = TomlConfigStore::with_data_dir(temp_dir.path().join("nested")).unwrap();
        assert!(!store.config_path().exists());

        let config = store.load().unwrap();
        assert!(config.privacy.local_only);
        assert_eq!(config.language.active, "en");
        assert!(store.config_path().exists());
    }

    #[test]
    fn test_config_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = TomlConfigStore::with_data_dir(temp_dir.path().to_path_buf()).unwrap();

        let mut config = AppConfig::new();
        config.privacy.local_only = false;
        config.logging.level = "debug".to_string();
        config.language.active = "kn".to_string();
        config.speech.rate = 1.0;
        config.voice_selection.denied_locale_prefixes.push("th".to_string());

        store.save(&config).unwrap();

        let loaded = store.load().unwrap();
        assert!(!loaded.privacy.local_only);
        assert_eq!(loaded.logging.level, "debug");
        assert_eq!(loaded.language.active, "kn");
        assert_eq!(loaded.speech.rate, 1.0);
        assert_eq!(
            loaded.voice_selection.denied_locale_prefixes,
            vec!["zh", "ja", "ko", "th"]
        );
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = TomlConfigStore::with_data_dir(temp_dir.path().to_path_buf()).unwrap();
        fs::write(store.config_path(), "[language\nactive = ").unwrap();

        assert!(matches!(store.load(), Err(DomainError::Config(_))));
    }
}
