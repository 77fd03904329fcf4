//! Authenticated API client for the storefront backend.
//!
//! Every call goes through the same pipeline: refresh the credential if one
//! is stored, dispatch with a bearer header, and end the session on a
//! terminal authorization failure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, ClientBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::{Credential, CredentialStore, SessionEvents, SessionRedirector, DEFAULT_LOGIN_ROUTE};

use super::envelope::Envelope;
use super::request::ApiRequest;
use super::wire::{LoginRequest, RefreshRequest, TokenGrant};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

const LOGIN_PATH: &str = "/auth/login";

const REFRESH_PATH: &str = "/auth/refresh_token";

/// HTTP request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

const USER_AGENT: &str = concat!("storefront-console/", env!("CARGO_PKG_VERSION"));

/// When the client renews the credential.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefreshPolicy {
    /// Refresh before every authenticated call
    #[default]
    EveryCall,
    /// Refresh after a 401 (then retry the call once), or ahead of a call
    /// when the refresh token is close to expiry
    OnUnauthorized,
}

/// Coalesces concurrent refreshes. The generation advances after every
/// refresh attempt, so a caller that waited on the lock can tell that
/// someone else already refreshed.
#[derive(Default)]
struct RefreshGate {
    lock: Mutex<()>,
    generation: AtomicU64,
}

/// API client for the storefront backend.
/// Clone is cheap - clones share the connection pool, the token store and
/// the refresh gate.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    store: Arc<dyn CredentialStore>,
    redirector: SessionRedirector,
    policy: RefreshPolicy,
    gate: Arc<RefreshGate>,
}

impl ApiClient {
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ===== Session =====

    /// Log in and store the issued credential
    pub async fn login(&self, email_or_username: &str, password: &str, remember_me: bool) -> Result<Credential, ApiError> {
        let body = LoginRequest {
            email_or_user_name: email_or_username.to_string(),
            password: password.to_string(),
            is_remember_me: remember_me,
        };

        let response = self.client.post(self.url(LOGIN_PATH)).json(&body).send().await?;
        let response = Self::check_status(response).await?;
        let grant: TokenGrant = Self::decode_envelope(response).await?;
        grant.validate()?;
        let expiry = grant.expiry()?;

        self.store.clear_token();
        self.store.set_credential(&grant.access_token, &grant.refresh_token, expiry);
        if remember_me {
            self.store.remember_me(&grant.access_token, &grant.refresh_token);
        }
        info!(user = email_or_username, remember_me, "Logged in");

        Ok(Credential {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            refresh_expiry: expiry,
            remember_me,
        })
    }

    /// Drop the stored credential
    pub fn logout(&self) {
        self.store.clear_token();
        info!("Logged out");
    }

    /// Exchange the stored pair for a new one and store it.
    ///
    /// Does not end the session on failure; the pipeline decides that.
    pub async fn refresh(&self) -> Result<Credential, ApiError> {
        let (access_token, refresh_token) = match (self.store.access_token(), self.store.refresh_token()) {
            (Some(access), Some(refresh)) => (access, refresh),
            _ => return Err(ApiError::Unauthorized),
        };

        let body = RefreshRequest {
            access_token,
            refresh_token,
        };
        let response = self.client.post(self.url(REFRESH_PATH)).json(&body).send().await?;
        let response = Self::check_status(response).await?;
        let grant: TokenGrant = Self::decode_envelope(response).await?;
        grant.validate()?;
        let expiry = grant.expiry()?;

        self.store.set_credential(&grant.access_token, &grant.refresh_token, expiry);
        debug!(expires = %expiry, "Credential refreshed");

        Ok(Credential {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            refresh_expiry: expiry,
            remember_me: self.store.is_remember_me(),
        })
    }

    /// Refresh once for everyone waiting. A failed refresh ends the session.
    async fn refresh_shared(&self) -> Result<(), ApiError> {
        let seen = self.gate.generation.load(Ordering::Acquire);
        let _guard = self.gate.lock.lock().await;

        if self.gate.generation.load(Ordering::Acquire) != seen {
            // Another call refreshed while we waited; a cleared store means it failed
            return if self.store.access_token().is_some() {
                debug!("Reusing credential from concurrent refresh");
                Ok(())
            } else {
                Err(ApiError::Unauthorized)
            };
        }

        let result = self.refresh().await;
        self.gate.generation.fetch_add(1, Ordering::Release);

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(error = %e, "Credential refresh failed");
                self.redirector.on_unauthorized();
                Err(ApiError::Unauthorized)
            }
        }
    }

    // ===== Pipeline =====

    /// Whether to refresh before dispatching. Under `OnUnauthorized` this
    /// only happens once the refresh token is about to expire.
    fn refresh_first(&self) -> bool {
        match self.policy {
            RefreshPolicy::EveryCall => true,
            RefreshPolicy::OnUnauthorized => self.store.credential().is_some_and(|c| c.needs_refresh()),
        }
    }

    /// Run a request through the pipeline and return the successful response
    pub async fn execute(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        let authenticated = self.store.access_token().is_some();

        if authenticated && self.refresh_first() {
            self.refresh_shared().await?;
        }

        let response = self.dispatch(request).await?;

        if response.status() == StatusCode::UNAUTHORIZED
            && authenticated
            && self.policy == RefreshPolicy::OnUnauthorized
        {
            debug!(path = request.path(), "Got 401, refreshing before retry");
            self.refresh_shared().await?;
            let retry = self.dispatch(request).await?;
            return self.check_response(retry).await;
        }

        self.check_response(response).await
    }

    /// Run a request and decode the body as `T`
    pub async fn execute_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        let response = self.execute(request).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", request.path(), e))
        })
    }

    /// Run a request, decode the response envelope and require `isSuccess`
    pub async fn execute_envelope<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        let response = self.execute(request).await?;
        Self::decode_envelope(response).await
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        let url = self.url(request.path());
        let mut builder = self
            .client
            .request(request.method().clone(), &url)
            .query(request.query_pairs());

        if let Some(token) = self.store.access_token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        debug!(method = %request.method(), url = %url, "Dispatching request");
        Ok(builder.send().await?)
    }

    /// Map a non-success response to an error, ending the session on 401
    async fn check_response(&self, response: Response) -> Result<Response, ApiError> {
        let result = Self::check_status(response).await;
        if let Err(ref e) = result {
            if e.is_terminal() {
                warn!("Request unauthorized, ending session");
                self.redirector.on_unauthorized();
            }
        }
        result
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_status(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn decode_envelope<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let bytes = response.bytes().await?;
        let envelope: Envelope<T> = serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response envelope: {}", e)))?;
        envelope.into_result()
    }
}

/// Builder for ApiClient
pub struct ApiClientBuilder {
    base_url: Option<String>,
    store: Option<Arc<dyn CredentialStore>>,
    login_route: String,
    policy: RefreshPolicy,
    timeout: Duration,
    user_agent: Option<String>,
}

impl Default for ApiClientBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            store: None,
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            policy: RefreshPolicy::default(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            user_agent: None,
        }
    }
}

impl ApiClientBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    pub fn policy(mut self, policy: RefreshPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client along with the receiver for its session events
    pub fn build(self) -> Result<(ApiClient, SessionEvents), ApiError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ApiError::Configuration("base_url is required".into()))?;
        let store = self
            .store
            .ok_or_else(|| ApiError::Configuration("a credential store is required".into()))?;

        let base_url = base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ApiError::Configuration("base_url is empty".into()));
        }

        let client = ClientBuilder::new()
            .timeout(self.timeout)
            .user_agent(self.user_agent.unwrap_or_else(|| USER_AGENT.to_string()))
            .build()?;

        let (redirector, events) = SessionRedirector::new(store.clone(), self.login_route);

        let api = ApiClient {
            client,
            base_url,
            store,
            redirector,
            policy: self.policy,
            gate: Arc::new(RefreshGate::default()),
        };
        Ok((api, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenStore;

    #[test]
    fn test_builder_requires_base_url_and_store() {
        let result = ApiClient::builder().build();
        assert!(matches!(result, Err(ApiError::Configuration(_))));

        let result = ApiClient::builder().base_url("http://localhost:5000").build();
        assert!(matches!(result, Err(ApiError::Configuration(_))));
    }

    #[test]
    fn test_builder_trims_trailing_slash() {
        let (client, _events) = ApiClient::builder()
            .base_url("http://localhost:5000/api/")
            .store(Arc::new(TokenStore::ephemeral()))
            .build()
            .unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000/api");
        assert_eq!(client.url("/products"), "http://localhost:5000/api/products");
        assert_eq!(client.policy(), RefreshPolicy::EveryCall);
    }

    #[test]
    fn test_refresh_policy_names() {
        assert_eq!(serde_json::to_string(&RefreshPolicy::EveryCall).unwrap(), "\"every-call\"");
        let policy: RefreshPolicy = serde_json::from_str("\"on-unauthorized\"").unwrap();
        assert_eq!(policy, RefreshPolicy::OnUnauthorized);
    }
}
