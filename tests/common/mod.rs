#![allow(dead_code)]

use std::sync::Arc;

use corpus_client::dev_server::{corpus::Corpus, DevServer};
use corpus_client::{ApiClient, ClientConfig, MemoryTokenStore, SessionContext, SessionStore, TokenStore};

pub const ADMIN: (&str, &str) = ("admin@corpus.com", "secret");
pub const ANALYST: (&str, &str) = ("analyst@corpus.com", "analyst");

pub struct Harness {
    pub server: DevServer,
    pub api: ApiClient,
    pub sessions: SessionStore,
    pub store: Arc<MemoryTokenStore>,
}

pub async fn spawn_server() -> DevServer {
    DevServer::spawn(Corpus::demo())
        .await
        .expect("Failed to start dev server")
}

pub fn client_for(server: &DevServer, store: Arc<dyn TokenStore>) -> ApiClient {
    ApiClient::new(
        ClientConfig::new(server.base_url()),
        SessionContext::new(store),
    )
    .expect("Failed to build client")
}

pub async fn harness() -> Harness {
    let server = spawn_server().await;
    let store = Arc::new(MemoryTokenStore::new());
    let api = client_for(&server, store.clone());
    let sessions = SessionStore::new(api.clone());
    Harness {
        server,
        api,
        sessions,
        store,
    }
}

pub async fn signed_in(credentials: (&str, &str)) -> Harness {
    let h = harness().await;
    h.sessions
        .login(credentials.0, credentials.1)
        .await
        .expect("login");
    h.sessions.verify().await.expect("verify");
    h
}

pub fn ids(hits: &[corpus_client::Hit]) -> Vec<&str> {
    hits.iter().map(|h| h.id.as_str()).collect()
}
