//! Session store operations: login, identity verification, logout.

use tracing::{info, warn};

use crate::error::AuthError;
use crate::http::ApiClient;
use crate::models::{TokenResponse, UserProfile};
use crate::session::{SessionContext, SessionState};
use crate::task::TaskGuard;

pub const TOKEN_PATH: &str = "/auth/token";
pub const IDENTITY_PATH: &str = "/auth/users/me";

#[derive(Clone)]
pub struct SessionStore {
    api: ApiClient,
}

impl SessionStore {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn session(&self) -> &SessionContext {
        self.api.session()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.session().user()
    }

    /// Exchanges form-encoded credentials for a token. On success the session
    /// is `PendingVerification` until [`SessionStore::verify`] (or the identity
    /// sync effect) confirms it.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let response: TokenResponse = self
            .api
            .post_form(TOKEN_PATH, &[("username", username), ("password", password)])
            .await
            .map_err(|e| {
                warn!(username, error = %e, "login failed");
                AuthError::from(e)
            })?;

        self.session().set_token(response.access_token).await?;
        info!(username, "token issued, verifying identity");
        Ok(())
    }

    /// Resolves a pending token against the identity endpoint. Any failure,
    /// including an unreachable server, logs the session out.
    pub async fn verify(&self) -> Result<UserProfile, AuthError> {
        let Some(token) = self.session().token() else {
            return Err(AuthError::Rejected);
        };

        match self.api.get_json::<UserProfile>(IDENTITY_PATH).await {
            Ok(user) if user.disabled => {
                warn!(username = %user.username, "account disabled, logging out");
                self.session().clear_if_current(&token).await;
                Err(AuthError::Rejected)
            }
            Ok(user) => {
                if self.session().set_user_if_current(&token, user.clone()) {
                    info!(username = %user.username, "session authenticated");
                }
                Ok(user)
            }
            Err(e) => {
                warn!(error = %e, "token is invalid, logging out");
                self.session().clear_if_current(&token).await;
                Err(AuthError::from(e))
            }
        }
    }

    /// Startup helper: verifies a restored token, returning the resulting state.
    pub async fn resume(&self) -> SessionState {
        if self.session().state() == SessionState::PendingVerification {
            let _ = self.verify().await;
        }
        self.session().state()
    }

    /// Clears token and profile; safe to call in any state.
    pub async fn logout(&self) {
        if self.session().state() != SessionState::Anonymous {
            info!("logged out");
        }
        self.session().clear().await;
    }

    /// Re-verifies the identity every time the token changes. Dropping the
    /// returned guard stops the effect.
    pub fn spawn_identity_sync(&self) -> TaskGuard {
        let store = self.clone();
        let mut rx = self.session().subscribe();
        TaskGuard::spawn(async move {
            loop {
                let pending =
                    rx.borrow_and_update().state() == SessionState::PendingVerification;
                if pending {
                    let _ = store.verify().await;
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}
