use std::path::PathBuf;

use crate::domain::{AppConfig, DomainError};

/// Where engine settings live between runs.
pub trait ConfigStore: Send + Sync {
    /// Read the stored settings, writing defaults on first use.
    fn load(&self) -> Result<AppConfig, DomainError>;

    fn save(&self, config: &AppConfig) -> Result<(), DomainError>;

    fn config_path(&self) -> PathBuf;

    /// Root directory for config, logs and profile overrides.
    fn data_dir(&self) -> PathBuf;

    fn logs_dir(&self) -> PathBuf;
}
