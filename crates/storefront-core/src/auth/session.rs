use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::store::CredentialStore;

/// Route the console shows when no session is active
pub const DEFAULT_LOGIN_ROUTE: &str = "/auth";

/// Session transitions for whoever owns navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session ended and the user must log in again
    LoginRequired { route: String },
}

/// Receiving end of the redirector's events
pub type SessionEvents = mpsc::UnboundedReceiver<SessionEvent>;

/// Ends the session on a terminal authorization failure.
///
/// Clearing the store and telling the top-level controller to show the
/// login route happen in the same synchronous call, so no caller can see
/// the redirect before the credential is gone.
#[derive(Clone)]
pub struct SessionRedirector {
    store: Arc<dyn CredentialStore>,
    login_route: String,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionRedirector {
    pub fn new(store: Arc<dyn CredentialStore>, login_route: impl Into<String>) -> (Self, SessionEvents) {
        let (events, receiver) = mpsc::unbounded_channel();
        let redirector = Self {
            store,
            login_route: login_route.into(),
            events,
        };
        (redirector, receiver)
    }

    pub fn login_route(&self) -> &str {
        &self.login_route
    }

    /// Clear the credential and request navigation to the login route.
    /// Safe to call when already logged out.
    pub fn on_unauthorized(&self) {
        if self.store.access_token().is_some() {
            info!(route = %self.login_route, "Session ended, redirecting to login");
        } else {
            debug!(route = %self.login_route, "Already logged out, redirecting to login");
        }
        self.store.clear_token();

        let event = SessionEvent::LoginRequired {
            route: self.login_route.clone(),
        };
        if self.events.send(event).is_err() {
            debug!("No session listener, dropping login redirect");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenStore;
    use chrono::{Duration, Utc};

    fn logged_in_store() -> Arc<dyn CredentialStore> {
        let store = TokenStore::ephemeral();
        store.set_credential("A", "R", Utc::now() + Duration::hours(1));
        Arc::new(store)
    }

    #[test]
    fn test_on_unauthorized_clears_and_redirects() {
        let store = logged_in_store();
        let (redirector, mut events) = SessionRedirector::new(store.clone(), DEFAULT_LOGIN_ROUTE);

        redirector.on_unauthorized();

        assert_eq!(store.access_token(), None);
        assert_eq!(store.refresh_token(), None);
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::LoginRequired {
                route: "/auth".to_string()
            }
        );
    }

    #[test]
    fn test_on_unauthorized_is_idempotent() {
        let store = logged_in_store();
        let (redirector, mut events) = SessionRedirector::new(store.clone(), "/login");

        redirector.on_unauthorized();
        redirector.on_unauthorized();

        assert!(store.credential().is_none());
        assert_eq!(store.access_token(), None);
        for _ in 0..2 {
            assert_eq!(
                events.try_recv().unwrap(),
                SessionEvent::LoginRequired {
                    route: "/login".to_string()
                }
            );
        }
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_dropped_listener_is_not_an_error() {
        let store = logged_in_store();
        let (redirector, events) = SessionRedirector::new(store.clone(), DEFAULT_LOGIN_ROUTE);
        drop(events);

        redirector.on_unauthorized();
        assert_eq!(store.access_token(), None);
        assert_eq!(redirector.login_route(), "/auth");
    }
}
