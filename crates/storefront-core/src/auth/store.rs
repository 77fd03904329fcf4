use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::credential::{Credential, CredentialRecord};
use super::scope::{MemoryScope, PersistenceScope};

/// Read/write/clear access to the active credential.
///
/// None of these operations fail. A missing value is `None`, and problems
/// persisting to a durable scope are logged rather than returned.
pub trait CredentialStore: Send + Sync {
    fn access_token(&self) -> Option<String>;

    fn refresh_token(&self) -> Option<String>;

    fn refresh_expiry(&self) -> Option<DateTime<Utc>>;

    fn set_access_token(&self, token: &str);

    fn set_refresh_token(&self, token: &str);

    fn set_refresh_expiry(&self, expiry: DateTime<Utc>);

    /// Replace access token, refresh token and expiry as one unit
    fn set_credential(&self, access_token: &str, refresh_token: &str, expiry: DateTime<Utc>);

    /// True when no expiry is stored or the stored expiry has passed
    fn is_token_expired(&self) -> bool;

    /// Remove the credential from every scope
    fn clear_token(&self);

    /// Keep the pair in the durable scope so it survives a restart
    fn remember_me(&self, access_token: &str, refresh_token: &str);

    fn is_remember_me(&self) -> bool;

    /// Snapshot of the full credential, if one is stored
    fn credential(&self) -> Option<Credential>;
}

/// Token store with an in-memory record mirrored to a durable scope while
/// remember-me is on.
///
/// Durable writes happen after the record lock is released, so readers never
/// wait on file or keychain I/O. Each change gets a version, and a snapshot
/// older than the last one written is dropped.
pub struct TokenStore {
    record: RwLock<CredentialRecord>,
    version: AtomicU64,
    persisted: Mutex<u64>,
    durable: Box<dyn PersistenceScope>,
}

impl TokenStore {
    /// Open a store over a durable scope, picking up whatever it holds
    pub fn open(durable: Box<dyn PersistenceScope>) -> Self {
        let record = match durable.load() {
            Ok(Some(record)) => {
                debug!(scope = durable.name(), "Loaded remembered credential");
                record
            }
            Ok(None) => CredentialRecord::default(),
            Err(e) => {
                warn!(scope = durable.name(), error = %e, "Ignoring unreadable credential");
                CredentialRecord::default()
            }
        };

        Self {
            record: RwLock::new(record),
            version: AtomicU64::new(0),
            persisted: Mutex::new(0),
            durable,
        }
    }

    /// A store with nothing durable behind it
    pub fn ephemeral() -> Self {
        Self::open(Box::new(MemoryScope::new()))
    }

    fn read(&self) -> RwLockReadGuard<'_, CredentialRecord> {
        self.record.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a change under the write lock, then mirror the result to the
    /// durable scope if remember-me is on.
    fn update(&self, change: impl FnOnce(&mut CredentialRecord)) {
        let (snapshot, version) = {
            let mut record = self.record.write().unwrap_or_else(PoisonError::into_inner);
            change(&mut record);
            (record.clone(), self.next_version())
        };
        if snapshot.remember_me {
            self.persist(version, "Failed to persist credential", |durable| durable.save(&snapshot));
        }
    }

    /// Must be called with the record write lock held
    fn next_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn persist(&self, version: u64, failure: &str, write: impl FnOnce(&dyn PersistenceScope) -> anyhow::Result<()>) {
        let mut persisted = self.persisted.lock().unwrap_or_else(PoisonError::into_inner);
        if *persisted >= version {
            debug!(version, "Skipping stale credential write");
            return;
        }
        match write(self.durable.as_ref()) {
            Ok(()) => *persisted = version,
            Err(e) => warn!(scope = self.durable.name(), error = %e, "{}", failure),
        }
    }
}

impl CredentialStore for TokenStore {
    fn access_token(&self) -> Option<String> {
        self.read().access_token.clone()
    }

    fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token.clone()
    }

    fn refresh_expiry(&self) -> Option<DateTime<Utc>> {
        self.read().refresh_expiry
    }

    fn set_access_token(&self, token: &str) {
        self.update(|r| r.access_token = Some(token.to_string()));
    }

    fn set_refresh_token(&self, token: &str) {
        self.update(|r| r.refresh_token = Some(token.to_string()));
    }

    fn set_refresh_expiry(&self, expiry: DateTime<Utc>) {
        self.update(|r| r.refresh_expiry = Some(expiry));
    }

    fn set_credential(&self, access_token: &str, refresh_token: &str, expiry: DateTime<Utc>) {
        self.update(|r| {
            r.access_token = Some(access_token.to_string());
            r.refresh_token = Some(refresh_token.to_string());
            r.refresh_expiry = Some(expiry);
        });
    }

    fn is_token_expired(&self) -> bool {
        match self.read().refresh_expiry {
            Some(expiry) => Utc::now() >= expiry,
            None => true,
        }
    }

    fn clear_token(&self) {
        let version = {
            let mut record = self.record.write().unwrap_or_else(PoisonError::into_inner);
            *record = CredentialRecord::default();
            self.next_version()
        };
        self.persist(version, "Failed to clear persisted credential", |durable| durable.clear());
    }

    fn remember_me(&self, access_token: &str, refresh_token: &str) {
        self.update(|r| {
            r.access_token = Some(access_token.to_string());
            r.refresh_token = Some(refresh_token.to_string());
            r.remember_me = true;
        });
    }

    fn is_remember_me(&self) -> bool {
        self.read().remember_me
    }

    fn credential(&self) -> Option<Credential> {
        self.read().credential()
    }
}
