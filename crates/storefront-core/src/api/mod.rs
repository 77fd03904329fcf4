//! REST API client module for the storefront backend.
//!
//! This module provides the `ApiClient` through which every console screen
//! talks to the backend, plus the request and response types it speaks.
//!
//! Authenticated calls carry a bearer token from the `CredentialStore`; the
//! client refreshes that token through `/auth/refresh_token` and ends the
//! session when the backend refuses it.

pub mod client;
pub mod envelope;
pub mod error;
pub mod request;
pub mod wire;

pub use client::{ApiClient, ApiClientBuilder, RefreshPolicy};
pub use envelope::{Envelope, EnvelopeError};
pub use error::ApiError;
pub use request::ApiRequest;
pub use wire::{LoginRequest, RefreshRequest, TokenGrant};
