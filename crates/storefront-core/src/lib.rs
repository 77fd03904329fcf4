//! Core library for the storefront console.
//!
//! Every console screen (admin back-office, vendor dashboard, landing site)
//! reaches the backend through the `ApiClient` in this crate:
//!
//! - `auth`: the credential, the `TokenStore` and its persistence scopes,
//!   and the `SessionRedirector` that ends a session
//! - `api`: the request pipeline, response envelope and error taxonomy
//! - `config`: on-disk configuration and client construction

pub mod api;
pub mod auth;
pub mod config;

pub use api::{ApiClient, ApiError, ApiRequest, Envelope, RefreshPolicy};
pub use auth::{Credential, CredentialStore, SessionEvent, SessionEvents, TokenStore};
pub use config::Config;
