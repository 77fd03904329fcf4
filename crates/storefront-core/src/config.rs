//! Application configuration management.
//!
//! This module handles loading and saving the console configuration: the
//! API base URL, login route, refresh policy, request timeout, where the
//! remembered credential is kept, and the last used login name.
//!
//! Configuration is stored at `~/.config/storefront/config.json`.
//! `STOREFRONT_BASE_URL`, `STOREFRONT_STORAGE` and
//! `STOREFRONT_REFRESH_POLICY` override the file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::{ApiClient, RefreshPolicy};
use crate::auth::keychain::DEFAULT_ACCOUNT;
use crate::auth::{FileScope, KeyringScope, PersistenceScope, SessionEvents, TokenStore, DEFAULT_LOGIN_ROUTE};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "storefront";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where a remembered credential is kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub login_route: String,
    pub refresh_policy: RefreshPolicy,
    pub request_timeout_secs: u64,
    pub storage: StorageBackend,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            refresh_policy: RefreshPolicy::default(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            storage: StorageBackend::default(),
            last_username: None,
        }
    }
}

impl Config {
    /// Load from the default location and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply overrides from `lookup` (the process environment in `load`)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("STOREFRONT_BASE_URL") {
            self.base_url = url;
        }
        if let Some(storage) = lookup("STOREFRONT_STORAGE") {
            self.storage = serde_json::from_value(serde_json::Value::String(storage.to_lowercase()))
                .with_context(|| format!("Unknown STOREFRONT_STORAGE value: {}", storage))?;
        }
        if let Some(policy) = lookup("STOREFRONT_REFRESH_POLICY") {
            self.refresh_policy = serde_json::from_value(serde_json::Value::String(policy.to_lowercase()))
                .with_context(|| format!("Unknown STOREFRONT_REFRESH_POLICY value: {}", policy))?;
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The durable scope selected by `storage`.
    ///
    /// `Keyring` is an error in builds without an OS keychain backend.
    pub fn durable_scope(&self) -> Result<Box<dyn PersistenceScope>> {
        Ok(match self.storage {
            StorageBackend::File => Box::new(FileScope::new(self.cache_dir()?)),
            StorageBackend::Keyring => Box::new(KeyringScope::open(DEFAULT_ACCOUNT)?),
        })
    }

    /// Open the token store and build an API client over it
    pub fn connect(&self) -> Result<(ApiClient, SessionEvents)> {
        let store = Arc::new(TokenStore::open(self.durable_scope()?));
        let (client, events) = ApiClient::builder()
            .base_url(&self.base_url)
            .store(store)
            .login_route(&self.login_route)
            .policy(self.refresh_policy)
            .timeout(self.request_timeout())
            .build()?;
        Ok((client, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.login_route, "/auth");
        assert_eq!(config.refresh_policy, RefreshPolicy::EveryCall);
        assert_eq!(config.storage, StorageBackend::File);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storefront").join("config.json");
        let config = Config {
            base_url: "https://shop.example.com/api".to_string(),
            refresh_policy: RefreshPolicy::OnUnauthorized,
            storage: StorageBackend::Keyring,
            last_username: Some("vendor@example.com".to_string()),
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.base_url, "https://shop.example.com/api");
        assert_eq!(loaded.refresh_policy, RefreshPolicy::OnUnauthorized);
        assert_eq!(loaded.storage, StorageBackend::Keyring);
        assert_eq!(loaded.last_username.as_deref(), Some("vendor@example.com"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"base_url": "https://admin.example.com"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.base_url, "https://admin.example.com");
        assert_eq!(config.login_route, "/auth");
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(|key| match key {
                "STOREFRONT_BASE_URL" => Some("http://127.0.0.1:8080".to_string()),
                "STOREFRONT_STORAGE" => Some("Keyring".to_string()),
                "STOREFRONT_REFRESH_POLICY" => Some("on-unauthorized".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.storage, StorageBackend::Keyring);
        assert_eq!(config.refresh_policy, RefreshPolicy::OnUnauthorized);
    }

    #[test]
    fn test_keyring_storage_needs_a_keychain_backend() {
        let config = Config {
            storage: StorageBackend::Keyring,
            ..Default::default()
        };
        match config.durable_scope() {
            Ok(scope) => {
                assert!(crate::auth::keychain::keychain_available());
                assert_eq!(scope.name(), "keyring");
            }
            Err(e) => {
                assert!(!crate::auth::keychain::keychain_available());
                assert!(e.to_string().contains("keychain"));
                assert!(config.connect().is_err());
            }
        }
    }

    #[test]
    fn test_bad_override_is_an_error() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| (key == "STOREFRONT_STORAGE").then(|| "floppy".to_string()));
        assert!(result.is_err());
    }
}
