use anyhow::{bail, Context, Result};
use keyring::credential::CredentialPersistence;
use keyring::Entry;

use super::credential::CredentialRecord;
use super::scope::PersistenceScope;

const SERVICE_NAME: &str = "storefront-console";

/// Default keychain account the credential record is filed under
pub const DEFAULT_ACCOUNT: &str = "credential";

/// True when keyring entries outlive the process.
///
/// Without a native backend compiled in (the `keychain` feature), keyring
/// falls back to a mock store that forgets everything on restart.
pub fn keychain_available() -> bool {
    matches!(
        keyring::default::default_credential_builder().persistence(),
        CredentialPersistence::UntilReboot | CredentialPersistence::UntilDelete
    )
}

/// Durable scope backed by the OS keychain. The record is stored as a JSON
/// blob in the entry's secret.
pub struct KeyringScope {
    account: String,
}

impl KeyringScope {
    /// Open the scope, refusing when no OS keychain backend is compiled in
    pub fn open(account: impl Into<String>) -> Result<Self> {
        if !keychain_available() {
            bail!("No OS keychain backend in this build; rebuild with the `keychain` feature or use file storage");
        }
        Ok(Self {
            account: account.into(),
        })
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &self.account).context("Failed to create keyring entry")
    }
}

impl PersistenceScope for KeyringScope {
    fn name(&self) -> &'static str {
        "keyring"
    }

    fn load(&self) -> Result<Option<CredentialRecord>> {
        match self.entry()?.get_password() {
            Ok(secret) => {
                let record = serde_json::from_str(&secret)
                    .context("Failed to parse credential from keychain")?;
                Ok(Some(record))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve credential from keychain"),
        }
    }

    fn save(&self, record: &CredentialRecord) -> Result<()> {
        let secret = serde_json::to_string(record)?;
        self.entry()?
            .set_password(&secret)
            .context("Failed to store credential in keychain")
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}
