//! Session state shared by every component of the client.
//!
//! `SessionContext` is the single owner of the bearer token. Readers take a
//! fresh copy per call; observers subscribe to a `watch` channel and are woken
//! on every mutation. Mutation is crate-private and goes through
//! [`crate::auth::SessionStore`] or the HTTP adapter's rejection handling.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::AuthError;
use crate::models::UserProfile;
use crate::token_store::TokenStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    /// Token present, identity not yet confirmed.
    PendingVerification,
    Authenticated,
    /// Profile without a token. Not reachable through the public operations.
    Invalid,
}

#[derive(Clone, Default, PartialEq)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<UserProfile>,
}

impl Session {
    pub fn state(&self) -> SessionState {
        match (&self.token, &self.user) {
            (None, None) => SessionState::Anonymous,
            (Some(_), None) => SessionState::PendingVerification,
            (Some(_), Some(_)) => SessionState::Authenticated,
            (None, Some(_)) => SessionState::Invalid,
        }
    }
}

// Keeps the credential out of logs and panic messages.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("user", &self.user)
            .finish()
    }
}

struct Inner {
    tx: watch::Sender<Session>,
    store: Arc<dyn TokenStore>,
}

#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<Inner>,
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("session", &*self.inner.tx.borrow())
            .finish()
    }
}

impl SessionContext {
    /// An anonymous session backed by `store`. Nothing is read from the store.
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self::with_session(store, Session::default())
    }

    /// Startup path: a persisted token puts the session in `PendingVerification`.
    pub async fn restore(store: Arc<dyn TokenStore>) -> Result<Self, AuthError> {
        let token = store.load().await?;
        if token.is_some() {
            info!("restored persisted token, identity pending verification");
        }
        Ok(Self::with_session(store, Session { token, user: None }))
    }

    fn with_session(store: Arc<dyn TokenStore>, session: Session) -> Self {
        let (tx, _rx) = watch::channel(session);
        Self {
            inner: Arc::new(Inner { tx, store }),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.inner.tx.borrow().token.clone()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.inner.tx.borrow().user.clone()
    }

    pub fn state(&self) -> SessionState {
        self.inner.tx.borrow().state()
    }

    pub fn snapshot(&self) -> Session {
        self.inner.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.tx.subscribe()
    }

    /// Persists a freshly issued token, then installs it. Any previous profile
    /// is dropped since it belonged to the old credential. If the token cannot
    /// be saved the session is left as it was.
    pub(crate) async fn set_token(&self, token: String) -> Result<(), AuthError> {
        self.inner.store.save(&token).await?;
        self.inner.tx.send_replace(Session {
            token: Some(token),
            user: None,
        });
        Ok(())
    }

    /// Attaches a verified profile, unless the token changed while the
    /// identity request was in flight.
    pub(crate) fn set_user_if_current(&self, token: &str, user: UserProfile) -> bool {
        self.inner.tx.send_if_modified(|session| {
            if session.token.as_deref() != Some(token) {
                return false;
            }
            let changed = session.user.as_ref() != Some(&user);
            session.user = Some(user);
            changed
        })
    }

    /// Unconditional clear; idempotent. The persisted token is removed even
    /// when the in-memory session was already empty.
    pub(crate) async fn clear(&self) {
        self.inner.tx.send_if_modified(|session| {
            let was_set = session.token.is_some() || session.user.is_some();
            *session = Session::default();
            was_set
        });
        if let Err(e) = self.inner.store.clear().await {
            warn!(error = %e, "failed to remove persisted token");
        }
    }

    /// Clears the session only if `token` is still the active credential.
    /// A late rejection of a replaced token leaves the newer session alone.
    pub(crate) async fn clear_if_current(&self, token: &str) -> bool {
        let cleared = self.inner.tx.send_if_modified(|session| {
            if session.token.as_deref() != Some(token) {
                return false;
            }
            *session = Session::default();
            true
        });
        if cleared {
            if let Err(e) = self.inner.store.clear().await {
                warn!(error = %e, "failed to remove persisted token");
            }
        }
        cleared
    }
}
