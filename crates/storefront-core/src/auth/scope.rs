//! Persistence scopes behind the token store.
//!
//! The token store always keeps the live record in memory (the ephemeral
//! scope). When remember-me is on, every write is mirrored to a durable
//! scope so the credential survives a restart.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};

use super::credential::CredentialRecord;

/// Credential file name in the cache directory
const CREDENTIAL_FILE: &str = "credential.json";

/// A place a credential record can be persisted to.
pub trait PersistenceScope: Send + Sync {
    /// Short name used in log fields
    fn name(&self) -> &'static str;

    fn load(&self) -> Result<Option<CredentialRecord>>;

    fn save(&self, record: &CredentialRecord) -> Result<()>;

    fn clear(&self) -> Result<()>;
}

/// Process-memory scope. Clones share the same slot, which lets tests
/// "restart" a token store against the same simulated durable medium.
#[derive(Debug, Clone, Default)]
pub struct MemoryScope {
    slot: Arc<Mutex<Option<CredentialRecord>>>,
}

impl MemoryScope {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceScope for MemoryScope {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load(&self) -> Result<Option<CredentialRecord>> {
        Ok(self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, record: &CredentialRecord) -> Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(record.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// JSON file in the cache directory.
pub struct FileScope {
    cache_dir: PathBuf,
}

impl FileScope {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.cache_dir.join(CREDENTIAL_FILE)
    }

    fn write_file(path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        // Readers only ever see a complete file
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).context("Failed to write credential file")?;
        std::fs::rename(&tmp, path).context("Failed to replace credential file")?;
        Ok(())
    }
}

impl PersistenceScope for FileScope {
    fn name(&self) -> &'static str {
        "file"
    }

    fn load(&self) -> Result<Option<CredentialRecord>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read credential file")?;
        let record: CredentialRecord =
            serde_json::from_str(&contents).context("Failed to parse credential file")?;
        Ok(Some(record))
    }

    fn save(&self, record: &CredentialRecord) -> Result<()> {
        let contents = serde_json::to_string_pretty(record)?;
        Self::write_file(&self.path(), &contents)
    }

    fn clear(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove credential file")?;
        }
        Ok(())
    }
}
