use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::modules::encryption::{CipherError, MasterKey};
use crate::modules::error::ErrorKind;
use crate::{
    CONFIG_FILE_ENV, DEFAULT_CONFIG_FILE, DEFAULT_PROBE_TIMEOUT_SECS, DEFAULT_PROVIDERS_FILE,
    DEFAULT_SEND_TIMEOUT_SECS, PROVIDERS_FILE_ENV, SECRET_ENV,
};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("config secret must not be empty (set {} or \"secret\")", SECRET_ENV)]
    MissingSecret,

    #[error("config secret is invalid: {0}")]
    InvalidSecret(#[from] CipherError),

    #[error("{0} must be greater than zero")]
    InvalidTimeout(&'static str),
}

impl SettingsError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

/// Process settings, read from an optional JSON file plus environment overrides
#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct Settings {
    pub providers_file: PathBuf,
    pub secret: String,
    pub send_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            providers_file: PathBuf::from(DEFAULT_PROVIDERS_FILE),
            secret: String::new(),
            send_timeout_secs: DEFAULT_SEND_TIMEOUT_SECS,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl Settings {
    /// Load settings from the file named by the config env var (or the default
    /// path), then apply environment overrides and validate
    pub fn load() -> Result<Self, SettingsError> {
        let path = env::var(CONFIG_FILE_ENV)
            .ok()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        let mut settings = Self::from_file(Path::new(&path))?;
        settings.apply_overrides(env::var(SECRET_ENV).ok(), env::var(PROVIDERS_FILE_ENV).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Read a settings file; a missing file yields defaults
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_str(&data).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_overrides(&mut self, secret: Option<String>, providers_file: Option<String>) {
        if let Some(secret) = secret.filter(|s| !s.trim().is_empty()) {
            self.secret = secret;
        }
        if let Some(path) = providers_file.filter(|p| !p.trim().is_empty()) {
            self.providers_file = PathBuf::from(path.trim());
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.master_key()?;
        if self.send_timeout_secs == 0 {
            return Err(SettingsError::InvalidTimeout("send_timeout_secs"));
        }
        if self.probe_timeout_secs == 0 {
            return Err(SettingsError::InvalidTimeout("probe_timeout_secs"));
        }
        Ok(())
    }

    /// Build the store key from the raw bytes of the configured secret
    pub fn master_key(&self) -> Result<MasterKey, SettingsError> {
        let secret = self.secret.trim();
        if secret.is_empty() {
            return Err(SettingsError::MissingSecret);
        }
        Ok(MasterKey::new(secret.as_bytes().to_vec())?)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("providers_file", &self.providers_file)
            .field("secret", &"***")
            .field("send_timeout_secs", &self.send_timeout_secs)
            .field("probe_timeout_secs", &self.probe_timeout_secs)
            .field("log_level", &self.log_level)
            .field("log_file", &self.log_file)
            .finish()
    }
}
