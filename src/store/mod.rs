use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;

use crate::config::GatewayDefaults;
use crate::error::WahaError;

const GLOBAL_KEY: &str = "waha_config";
const STORE_FILE: &str = "waha.json";

/// Where a clinic's gateway lives and how to authenticate against it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub url: String,
    pub api_key: String,
}

impl GatewayConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Reject anything that is not an absolute http(s) URL
    pub fn validate(&self) -> Result<(), WahaError> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| WahaError::InvalidConfig(format!("{}: {}", self.url, e)))?;

        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(WahaError::InvalidConfig(format!("unsupported scheme '{}'", other))),
        }
    }
}

impl From<&GatewayDefaults> for GatewayConfig {
    fn from(defaults: &GatewayDefaults) -> Self {
        GatewayConfig::new(defaults.url.clone(), defaults.api_key.clone())
    }
}

/// Entry slot in a config store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreKey {
    Clinic(String),
    Global,
}

impl StoreKey {
    pub fn clinic(clinic_id: impl Into<String>) -> Self {
        StoreKey::Clinic(clinic_id.into())
    }

    pub fn as_key(&self) -> String {
        match self {
            StoreKey::Clinic(id) => format!("{}_{}", GLOBAL_KEY, id),
            StoreKey::Global => GLOBAL_KEY.to_string(),
        }
    }
}

/// Where the config was found during resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Clinic,
    Global,
    Default,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config directory unavailable: {0}")]
    NoConfigDir(String),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Typed keyed storage for gateway configurations, injected per clinic context
pub trait ConfigStore: Send + Sync {
    fn get(&self, key: &StoreKey) -> Result<Option<GatewayConfig>, StoreError>;

    fn set(&self, key: &StoreKey, config: GatewayConfig) -> Result<(), StoreError>;

    fn remove(&self, key: &StoreKey) -> Result<bool, StoreError>;

    /// Clinic entry, then global entry, then the built-in default.
    ///
    /// A level that cannot be read is logged and skipped, so one bad entry
    /// never blocks the fallbacks.
    fn resolve(&self, clinic_id: Option<&str>, defaults: &GatewayDefaults) -> (GatewayConfig, ConfigSource) {
        let mut levels = Vec::with_capacity(2);
        if let Some(id) = clinic_id.map(str::trim).filter(|id| !id.is_empty()) {
            levels.push((StoreKey::clinic(id), ConfigSource::Clinic));
        }
        levels.push((StoreKey::Global, ConfigSource::Global));

        for (key, source) in levels {
            match self.get(&key) {
                Ok(Some(config)) => return (config, source),
                Ok(None) => {}
                Err(e) => tracing::warn!("Skipping gateway config {}: {}", key.as_key(), e),
            }
        }

        (GatewayConfig::from(defaults), ConfigSource::Default)
    }
}

/// Process-local store, mostly for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, GatewayConfig>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryStore {
    fn get(&self, key: &StoreKey) -> Result<Option<GatewayConfig>, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(&key.as_key()).cloned())
    }

    fn set(&self, key: &StoreKey, config: GatewayConfig) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.as_key(), config);
        Ok(())
    }

    fn remove(&self, key: &StoreKey) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.remove(&key.as_key()).is_some())
    }
}

/// JSON document in a config directory, one entry per key
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }

        Ok(Self {
            path: dir.join(STORE_FILE),
        })
    }

    /// Store under `configured` if given, otherwise `$HOME/.config/clinic-waha`
    pub fn open_default(configured: Option<&str>) -> Result<Self, StoreError> {
        let dir = match configured {
            Some(dir) => PathBuf::from(dir),
            None => {
                let home = std::env::var("HOME")
                    .map_err(|_| StoreError::NoConfigDir("HOME environment variable not set".to_string()))?;
                PathBuf::from(home).join(".config").join("clinic-waha")
            }
        };

        Self::new(dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw entries; each one is decoded on its own in `get`
    fn load(&self) -> Result<HashMap<String, Value>, StoreError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }

        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, entries: &HashMap<String, Value>) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl ConfigStore for FileStore {
    fn get(&self, key: &StoreKey) -> Result<Option<GatewayConfig>, StoreError> {
        let Some(raw) = self.load()?.remove(&key.as_key()) else {
            return Ok(None);
        };

        Ok(Some(serde_json::from_value(raw)?))
    }

    fn set(&self, key: &StoreKey, config: GatewayConfig) -> Result<(), StoreError> {
        let mut entries = self.load()?;
        entries.insert(key.as_key(), serde_json::to_value(config)?);
        self.save(&entries)
    }

    fn remove(&self, key: &StoreKey) -> Result<bool, StoreError> {
        let mut entries = self.load()?;
        let removed = entries.remove(&key.as_key()).is_some();
        if removed {
            self.save(&entries)?;
        }
        Ok(removed)
    }
}
