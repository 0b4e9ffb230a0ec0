use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::policy::{DigestEncoding, Policy, PolicyError};
use crate::modules::auth::cache::CacheConfig;
use crate::{
    DEFAULT_CACHE_LIFETIME_SECS, DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_HASH_ITERATIONS,
    DEFAULT_RELOAD_INTERVAL_SECS,
};

/// Errors raised while loading the settings or credential files
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed settings: {0}")]
    Settings(String),
    #[error("malformed credentials at line {line}: {reason}")]
    Credentials { line: usize, reason: String },
    #[error("invalid policy: {0}")]
    Policy(#[from] PolicyError),
}

/// On-disk settings, deserialized from JSON.
///
/// Every field is optional in the file and falls back to the defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub credentials_file: PathBuf,
    pub reload_interval_secs: u64,
    pub hashing: HashingSettings,
    pub salting: SaltingSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingSettings {
    pub enabled: bool,
    pub algorithm: String,
    pub iterations: u32,
    pub encoding: DigestEncoding,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaltingSettings {
    pub enabled: bool,
    pub salt_first: bool,
    pub separator: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub max_entries: usize,
    pub entry_lifetime_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            credentials_file: PathBuf::from("credentials.properties"),
            reload_interval_secs: DEFAULT_RELOAD_INTERVAL_SECS,
            hashing: HashingSettings::default(),
            salting: SaltingSettings::default(),
            cache: CacheSettings::default(),
        }
    }
}

impl Default for HashingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            algorithm: "SHA-512".to_string(),
            iterations: DEFAULT_HASH_ITERATIONS,
            encoding: DigestEncoding::Base64,
        }
    }
}

impl Default for SaltingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            salt_first: true,
            separator: "$".to_string(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            entry_lifetime_secs: DEFAULT_CACHE_LIFETIME_SECS,
        }
    }
}

impl Settings {
    /// Parse settings from JSON text
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let settings: Settings =
            serde_json::from_str(text).map_err(|e| ConfigError::Settings(e.to_string()))?;

        if settings.reload_interval_secs == 0 {
            return Err(ConfigError::Settings(
                "reload_interval_secs must be at least 1".to_string(),
            ));
        }
        settings.separator()?;

        Ok(settings)
    }

    /// The separator as a single character
    pub fn separator(&self) -> Result<char, ConfigError> {
        let mut chars = self.salting.separator.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(ConfigError::Settings(format!(
                "separator must be exactly one character, got {:?}",
                self.salting.separator
            ))),
        }
    }

    /// Build the validated hashing policy these settings describe
    pub fn policy(&self) -> Result<Policy, ConfigError> {
        let policy = Policy::builder()
            .hashing(self.hashing.enabled)
            .algorithm(self.hashing.algorithm.as_str())
            .iterations(self.hashing.iterations)
            .encoding(self.hashing.encoding)
            .salting(self.salting.enabled)
            .salt_first(self.salting.salt_first)
            .separator(self.separator()?)
            .build()?;
        Ok(policy)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_entries: self.cache.max_entries,
            entry_lifetime: Duration::from_secs(self.cache.entry_lifetime_secs),
        }
    }

    pub fn reload_interval(&self) -> Duration {
        Duration::from_secs(self.reload_interval_secs.max(1))
    }
}

/// Load settings from a JSON file.
///
/// A relative `credentials_file` is resolved against the directory holding
/// the settings file.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut settings = Settings::from_json(&text)?;
    if settings.credentials_file.is_relative() {
        if let Some(dir) = path.parent() {
            settings.credentials_file = dir.join(&settings.credentials_file);
        }
    }

    Ok(settings)
}
