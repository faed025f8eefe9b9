//! Authentication session: who is logged in, derived from the stored tokens.
//!
//! # Design
//! `Session` is an explicit context object. The application constructs one
//! at startup, calls `initialize` once, and passes it by reference to
//! whatever needs the current user. It owns the `ApiClient`, and through it
//! the shared `TokenStore`.
//!
//! State lives behind a `Mutex` that is never held across an `.await`.
//! `is_authenticated` is not stored; it is always `current_user.is_some()`.
//! Leaving any transition resets `is_loading` and moves the phase to
//! `Authenticated` or `Anonymous` to match the user.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{info, warn};

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::storage::TokenPair;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// `initialize` has not run yet. Reported as loading.
    Uninitialized,
    /// Checking a stored token against `/accounts/me/`.
    Restoring,
    LoggingIn,
    Authenticated,
    Anonymous,
}

/// Point-in-time copy of the session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub current_user: Option<User>,
    pub is_authenticated: bool,
    pub is_loading: bool,
}

#[derive(Debug)]
struct SessionState {
    phase: SessionPhase,
    current_user: Option<User>,
    is_loading: bool,
}

impl SessionState {
    fn begin(&mut self, phase: SessionPhase) {
        self.phase = phase;
        self.is_loading = true;
    }

    fn settle(&mut self, user: Option<User>) {
        self.phase = if user.is_some() {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Anonymous
        };
        self.current_user = user;
        self.is_loading = false;
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            current_user: self.current_user.clone(),
            is_authenticated: self.current_user.is_some(),
            is_loading: self.is_loading,
        }
    }
}

pub struct Session<T = ReqwestTransport> {
    client: ApiClient<T>,
    state: Mutex<SessionState>,
}

impl<T: Transport> Session<T> {
    pub fn new(client: ApiClient<T>) -> Self {
        Self {
            client,
            state: Mutex::new(SessionState {
                phase: SessionPhase::Uninitialized,
                current_user: None,
                is_loading: true,
            }),
        }
    }

    /// The client every data operation should go through.
    pub fn client(&self) -> &ApiClient<T> {
        &self.client
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    pub fn phase(&self) -> SessionPhase {
        self.lock().phase
    }

    pub fn current_user(&self) -> Option<User> {
        self.lock().current_user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().current_user.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().is_loading
    }

    /// Restore a session from the stored access token.
    ///
    /// Runs once; later calls return the current state untouched. A stored
    /// token that the backend rejects is discarded together with its refresh
    /// token. The failure itself is logged, not returned.
    pub async fn initialize(&self) -> SessionSnapshot {
        {
            let mut state = self.lock();
            if state.phase != SessionPhase::Uninitialized {
                return state.snapshot();
            }
            if self.client.tokens().access_token().is_none() {
                state.settle(None);
                info!("no stored session");
                return state.snapshot();
            }
            state.begin(SessionPhase::Restoring);
        }

        let user = match self.client.current_user().await {
            Ok(user) => {
                info!(username = %user.username, "session restored");
                Some(user)
            }
            Err(e) => {
                warn!(error = %e, "stored session rejected, clearing tokens");
                self.client.tokens().clear();
                None
            }
        };

        let mut state = self.lock();
        state.settle(user);
        state.snapshot()
    }

    /// Log in and load the user's profile.
    ///
    /// Errors are returned unchanged. On any failure the session ends up
    /// anonymous with no stored tokens.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, ApiError> {
        self.lock().begin(SessionPhase::LoggingIn);

        let result = self.authenticate(username, password).await;
        if let Err(e) = &result {
            warn!(username, error = %e, "login failed");
            self.client.tokens().clear();
        }

        self.lock().settle(result.as_ref().ok().cloned());
        if let Ok(user) = &result {
            info!(username = %user.username, "logged in");
        }
        result
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<User, ApiError> {
        let login = self.client.login(username, password).await?;
        self.client.tokens().store(&TokenPair {
            access: login.access,
            refresh: login.refresh,
        })?;
        self.client.current_user().await
    }

    /// Forget the user and the stored tokens. Cannot fail.
    pub fn logout(&self) {
        self.client.tokens().clear();
        self.lock().settle(None);
        info!("logged out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpRequest, HttpResponse};
    use crate::storage::{MemoryTokenStore, TokenStore};
    use std::sync::Arc;

    /// Answers `/accounts/me/` with a fixed status; everything else is 404.
    struct MeOnly {
        status: u16,
    }

    impl Transport for MeOnly {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
            let (status, body) = if request.url.ends_with("/accounts/me/") {
                if self.status == 200 {
                    (200, r#"{"id":1,"username":"alice","email":"a@example.com"}"#)
                } else {
                    (self.status, r#"{"detail":"token not valid"}"#)
                }
            } else {
                (404, "")
            };
            Ok(HttpResponse {
                status,
                status_text: String::new(),
                headers: Vec::new(),
                body: body.to_string(),
            })
        }
    }

    /// Issues a token pair, then fails `/accounts/me/` with a 500.
    struct ProfileDown;

    impl Transport for ProfileDown {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
            let (status, status_text, body) = if request.url.ends_with("/accounts/token/") {
                (200, "OK", r#"{"access":"fresh","refresh":"fresh-r"}"#)
            } else {
                (500, "Internal Server Error", "")
            };
            Ok(HttpResponse {
                status,
                status_text: status_text.to_string(),
                headers: Vec::new(),
                body: body.to_string(),
            })
        }
    }

    fn session(status: u16, tokens: Arc<MemoryTokenStore>) -> Session<MeOnly> {
        Session::new(ApiClient::new("http://api", MeOnly { status }, tokens))
    }

    fn stored() -> Arc<MemoryTokenStore> {
        Arc::new(MemoryTokenStore::with_pair(&TokenPair {
            access: "a".to_string(),
            refresh: "r".to_string(),
        }))
    }

    #[tokio::test]
    async fn starts_uninitialized() {
        let s = session(200, Arc::new(MemoryTokenStore::new()));
        let snap = s.snapshot();
        assert_eq!(snap.phase, SessionPhase::Uninitialized);
        assert!(!snap.is_authenticated);
        assert!(snap.is_loading, "loading until the first check settles");

        s.initialize().await;
        assert!(!s.is_loading());
    }

    #[tokio::test]
    async fn initialize_without_token_is_anonymous() {
        let s = session(200, Arc::new(MemoryTokenStore::new()));
        let snap = s.initialize().await;
        assert_eq!(snap.phase, SessionPhase::Anonymous);
        assert!(!snap.is_authenticated);
    }

    #[tokio::test]
    async fn initialize_restores_user() {
        let s = session(200, stored());
        let snap = s.initialize().await;
        assert_eq!(snap.phase, SessionPhase::Authenticated);
        assert!(snap.is_authenticated);
        assert_eq!(snap.current_user.unwrap().email, "a@example.com");
    }

    #[tokio::test]
    async fn initialize_clears_rejected_tokens() {
        let tokens = stored();
        let s = session(401, tokens.clone());
        let snap = s.initialize().await;
        assert!(!snap.is_authenticated);
        assert!(!snap.is_loading);
        assert!(tokens.access_token().is_none());
        assert!(tokens.refresh_token().is_none());
    }

    #[tokio::test]
    async fn initialize_runs_once() {
        let tokens = stored();
        let s = session(200, tokens.clone());
        s.initialize().await;
        s.logout();
        tokens
            .store(&TokenPair {
                access: "b".to_string(),
                refresh: "r".to_string(),
            })
            .unwrap();
        let snap = s.initialize().await;
        assert_eq!(snap.phase, SessionPhase::Anonymous);
    }

    #[tokio::test]
    async fn logout_clears_everything() {
        let tokens = stored();
        let s = session(200, tokens.clone());
        s.initialize().await;
        assert!(s.is_authenticated());

        s.logout();
        assert!(!s.is_authenticated());
        assert!(s.current_user().is_none());
        assert_eq!(s.phase(), SessionPhase::Anonymous);
        assert!(tokens.access_token().is_none());
        assert!(tokens.refresh_token().is_none());
    }

    #[tokio::test]
    async fn failed_login_leaves_session_anonymous() {
        // The token endpoint answers 404 here, so the login itself fails.
        let tokens = Arc::new(MemoryTokenStore::new());
        let s = session(200, tokens.clone());
        let err = s.login("alice", "pw").await.unwrap_err();
        assert!(matches!(err, ApiError::Login { status: 404, .. }));
        assert!(!s.is_authenticated());
        assert!(!s.is_loading());
        assert!(tokens.access_token().is_none());
    }

    #[tokio::test]
    async fn profile_failure_after_login_discards_new_tokens() {
        let tokens = Arc::new(MemoryTokenStore::new());
        let s = Session::new(ApiClient::new("http://api", ProfileDown, tokens.clone()));
        s.initialize().await;

        let err = s.login("alice", "pw").await.unwrap_err();
        match err {
            ApiError::Request { status, status_text, body } => {
                assert_eq!(status, 500);
                assert_eq!(status_text, "Internal Server Error");
                assert_eq!(body, crate::error::ErrorBody::Empty);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!s.is_authenticated());
        assert!(!s.is_loading());
        assert_eq!(s.phase(), SessionPhase::Anonymous);
        assert!(tokens.access_token().is_none());
        assert!(tokens.refresh_token().is_none());
    }
}
