mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{harness, signed_in, spawn_server, ADMIN, ANALYST};
use corpus_client::{
    Access, ApiClient, AuthError, ClientConfig, FileTokenStore, Route, RouteGuard,
    SearchController, SessionContext, SessionState, SessionStore, TokenStore,
};

#[tokio::test]
async fn login_then_verify_authenticates() {
    let h = harness().await;
    assert_eq!(h.api.session().state(), SessionState::Anonymous);

    h.sessions.login(ADMIN.0, ADMIN.1).await.unwrap();
    assert_eq!(h.api.session().state(), SessionState::PendingVerification);
    assert!(h.store.load().await.unwrap().is_some());

    let user = h.sessions.verify().await.unwrap();
    assert_eq!(user.username, ADMIN.0);
    assert_eq!(h.api.session().state(), SessionState::Authenticated);
    assert_eq!(h.sessions.current_user().unwrap().username, ADMIN.0);
}

#[tokio::test]
async fn bad_credentials_leave_session_anonymous() {
    let h = harness().await;
    let err = h.sessions.login(ADMIN.0, "wrong").await.unwrap_err();
    assert_eq!(err, AuthError::Rejected);
    assert_eq!(h.api.session().state(), SessionState::Anonymous);
    assert_eq!(h.store.load().await.unwrap(), None);
}

#[tokio::test]
async fn unreachable_backend_is_reported() {
    let store = Arc::new(corpus_client::MemoryTokenStore::new());
    let api = ApiClient::new(
        ClientConfig::new("http://127.0.0.1:1/api/v1"),
        SessionContext::new(store),
    )
    .unwrap();
    let err = SessionStore::new(api.clone())
        .login(ADMIN.0, ADMIN.1)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Unreachable(_)), "got {err:?}");
    assert_eq!(api.session().state(), SessionState::Anonymous);
}

#[tokio::test]
async fn revocation_mid_session_logs_out_and_redirects() {
    let h = signed_in(ANALYST).await;
    let mut guard = RouteGuard::watch(h.api.session(), Route::Search);
    assert_eq!(guard.current(), Access::Render(Route::Search));

    h.server.state().revoke_all();
    let search = SearchController::new(h.api.clone());
    search.search("invoice").await;

    assert!(search.snapshot().error.is_some());
    assert_eq!(h.api.session().state(), SessionState::Anonymous);
    assert_eq!(h.store.load().await.unwrap(), None);

    let redirect = tokio::time::timeout(Duration::from_secs(2), guard.until_redirect())
        .await
        .unwrap();
    assert_eq!(redirect, Some(Route::Login));
}

#[tokio::test]
async fn logout_is_idempotent() {
    let h = signed_in(ADMIN).await;
    h.sessions.logout().await;
    assert_eq!(h.api.session().state(), SessionState::Anonymous);
    assert_eq!(h.store.load().await.unwrap(), None);

    h.sessions.logout().await;
    assert_eq!(h.api.session().state(), SessionState::Anonymous);
}

#[tokio::test]
async fn logout_clears_storage_even_when_anonymous() {
    let server = spawn_server().await;
    let store = Arc::new(corpus_client::MemoryTokenStore::with_token("left-over"));
    let api = common::client_for(&server, store.clone());
    assert_eq!(api.session().state(), SessionState::Anonymous);

    SessionStore::new(api.clone()).logout().await;
    assert_eq!(api.session().state(), SessionState::Anonymous);
    assert_eq!(store.load().await.unwrap(), None);
}

#[tokio::test]
async fn persisted_token_survives_restart() {
    let server = spawn_server().await;
    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join(".corpus_token");
    let config = ClientConfig::new(server.base_url());

    {
        let store = Arc::new(FileTokenStore::new(&token_path));
        let session = SessionContext::restore(store).await.unwrap();
        let sessions = SessionStore::new(ApiClient::new(config.clone(), session).unwrap());
        sessions.login(ADMIN.0, ADMIN.1).await.unwrap();
        sessions.verify().await.unwrap();
    }
    assert!(token_path.exists());

    let store = Arc::new(FileTokenStore::new(&token_path));
    let session = SessionContext::restore(store).await.unwrap();
    assert_eq!(session.state(), SessionState::PendingVerification);
    assert_eq!(
        RouteGuard::check(&Route::Search, session.state()),
        Access::Render(Route::Search)
    );

    let sessions = SessionStore::new(ApiClient::new(config, session).unwrap());
    assert_eq!(sessions.resume().await, SessionState::Authenticated);
    assert_eq!(sessions.current_user().unwrap().username, ADMIN.0);
}

#[tokio::test]
async fn invalid_persisted_token_is_discarded_on_resume() {
    let server = spawn_server().await;
    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join(".corpus_token");
    std::fs::write(&token_path, "not-a-jwt").unwrap();

    let store = Arc::new(FileTokenStore::new(&token_path));
    let session = SessionContext::restore(store).await.unwrap();
    let sessions =
        SessionStore::new(ApiClient::new(ClientConfig::new(server.base_url()), session).unwrap());

    assert_eq!(sessions.resume().await, SessionState::Anonymous);
    assert!(!token_path.exists());
    assert!(RouteGuard::check(&Route::Dashboard, sessions.session().state()).is_redirect());
}

#[tokio::test]
async fn identity_sync_effect_resolves_pending_tokens() {
    let h = harness().await;
    let _sync = h.sessions.spawn_identity_sync();
    let mut rx = h.api.session().subscribe();

    h.sessions.login(ANALYST.0, ANALYST.1).await.unwrap();
    let session = tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| s.state() == SessionState::Authenticated),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();
    assert_eq!(session.user.unwrap().username, ANALYST.0);
}

#[tokio::test]
async fn disabled_account_fails_verification() {
    let h = harness().await;
    h.sessions.login(ANALYST.0, ANALYST.1).await.unwrap();
    h.server.state().set_disabled(ANALYST.0, true).await;

    assert!(h.sessions.verify().await.is_err());
    assert_eq!(h.api.session().state(), SessionState::Anonymous);
    assert_eq!(h.store.load().await.unwrap(), None);
}

struct ReadOnlyStore;

#[async_trait::async_trait]
impl TokenStore for ReadOnlyStore {
    async fn load(&self) -> Result<Option<String>, AuthError> {
        Ok(None)
    }

    async fn save(&self, _token: &str) -> Result<(), AuthError> {
        Err(AuthError::Storage("read-only".into()))
    }

    async fn clear(&self) -> Result<(), AuthError> {
        Ok(())
    }
}

#[tokio::test]
async fn login_that_cannot_persist_stays_anonymous() {
    let server = spawn_server().await;
    let api = common::client_for(&server, Arc::new(ReadOnlyStore));
    let sessions = SessionStore::new(api.clone());

    let err = sessions.login(ADMIN.0, ADMIN.1).await.unwrap_err();
    assert_eq!(err, AuthError::Storage("read-only".into()));
    assert_eq!(api.session().state(), SessionState::Anonymous);
    assert!(RouteGuard::check(&Route::Search, api.session().state()).is_redirect());
}
