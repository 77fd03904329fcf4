//! Authentication module for holding credentials and ending sessions.
//!
//! This module provides:
//! - `Credential`: the access/refresh pair and its refresh expiry
//! - `TokenStore`: the `CredentialStore` the API client reads and writes
//! - Persistence scopes: in-memory, JSON file, and OS keychain via keyring
//! - `SessionRedirector`: clears the store and asks for the login route
//!
//! Credentials live in memory unless remember-me is set, in which case every
//! write is mirrored to the durable scope.

pub mod credential;
pub mod keychain;
pub mod scope;
pub mod session;
pub mod store;

pub use credential::{Credential, CredentialRecord};
pub use keychain::KeyringScope;
pub use scope::{FileScope, MemoryScope, PersistenceScope};
pub use session::{SessionEvent, SessionEvents, SessionRedirector, DEFAULT_LOGIN_ROUTE};
pub use store::{CredentialStore, TokenStore};
