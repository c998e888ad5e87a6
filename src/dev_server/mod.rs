//! Stand-in corpus backend built on Axum.
//!
//! Speaks the same HTTP contract as the real service (token issuing, bearer
//! identity check, document search/retrieval/export, user admin) over an
//! in-memory corpus. Used by the integration tests and `scripts/mock_backend.rs`.

pub mod auth;
pub mod corpus;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Form, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use self::auth::{hash_password, verify_password, TokenSigner};
use self::corpus::{matches, to_csv, Corpus};
use crate::models::{
    Document, Hit, NewUser, SearchRequest, SearchResponse, TokenResponse, UserProfile,
};

pub const API_PREFIX: &str = "/api/v1";
const SEARCH_SIZE: usize = 100;
const EXPORT_SIZE: usize = 1000;
const DEFAULT_RECENT: usize = 20;

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (status, Json(json!({ "detail": detail.into() })))
}

struct StoredUser {
    profile: UserProfile,
    password_hash: String,
}

/// Shared server state (Arc-wrapped for the handlers).
pub struct DevState {
    signer: TokenSigner,
    users: RwLock<HashMap<String, StoredUser>>,
    documents: RwLock<Vec<Document>>,
    epoch: AtomicU64,
    delays: RwLock<HashMap<String, Duration>>,
}

impl DevState {
    pub fn new(corpus: Corpus) -> Result<Self, bcrypt::BcryptError> {
        let mut users = HashMap::new();
        for (profile, password) in corpus.users {
            let password_hash = hash_password(&password)?;
            users.insert(
                profile.username.clone(),
                StoredUser {
                    profile,
                    password_hash,
                },
            );
        }
        Ok(Self {
            signer: TokenSigner::new(
                uuid::Uuid::new_v4().to_string(),
                chrono::Duration::minutes(1440),
            ),
            users: RwLock::new(users),
            documents: RwLock::new(corpus.documents),
            epoch: AtomicU64::new(0),
            delays: RwLock::new(HashMap::new()),
        })
    }

    /// Invalidates every token issued so far.
    pub fn revoke_all(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Holds back the search (and export) response for `query` by `delay`.
    pub async fn set_query_delay(&self, query: &str, delay: Duration) {
        self.set_delay(format!("search:{query}"), delay).await;
    }

    /// Holds back `GET /documents/{id}` for this id by `delay`.
    pub async fn set_document_delay(&self, id: &str, delay: Duration) {
        self.set_delay(format!("document:{id}"), delay).await;
    }

    /// Holds back `GET /documents/recent` for this `limit` by `delay`.
    pub async fn set_recent_delay(&self, limit: usize, delay: Duration) {
        self.set_delay(format!("recent:{limit}"), delay).await;
    }

    pub async fn set_disabled(&self, username: &str, disabled: bool) {
        if let Some(user) = self.users.write().await.get_mut(username) {
            user.profile.disabled = disabled;
        }
    }

    async fn set_delay(&self, key: String, delay: Duration) {
        self.delays.write().await.insert(key, delay);
    }

    async fn delay(&self, key: &str) {
        let delay = self.delays.read().await.get(key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    async fn delay_for(&self, req: &SearchRequest) {
        let query = req.query.as_deref().unwrap_or_default();
        self.delay(&format!("search:{query}")).await;
    }
}

async fn require_bearer(
    State(state): State<Arc<DevState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let unauthorized = || api_error(StatusCode::UNAUTHORIZED, "Could not validate credentials");

    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(unauthorized)?;

    let claims = state.signer.validate(token).map_err(|_| unauthorized())?;
    if claims.epoch < state.epoch.load(Ordering::SeqCst) {
        return Err(unauthorized());
    }

    let profile = state
        .users
        .read()
        .await
        .get(&claims.sub)
        .map(|u| u.profile.clone())
        .ok_or_else(unauthorized)?;
    if profile.disabled {
        return Err(api_error(StatusCode::BAD_REQUEST, "Inactive user"));
    }

    req.extensions_mut().insert(profile);
    Ok(next.run(req).await)
}

pub fn router(state: Arc<DevState>) -> Router {
    let protected = Router::new()
        .route("/auth/users/me", get(me_handler))
        .route("/documents/recent", get(recent_handler))
        .route("/documents/search", post(search_handler))
        .route("/documents/export/csv", post(export_handler))
        .route("/documents/:id", get(get_document_handler))
        .route("/admin/users", get(list_users_handler).post(create_user_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    let api = Router::new()
        .route("/auth/token", post(token_handler))
        .merge(protected);

    Router::new()
        .route("/health", get(health_handler))
        .nest(API_PREFIX, api)
        .with_state(state)
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Deserialize)]
struct TokenForm {
    username: String,
    password: String,
}

async fn token_handler(
    State(state): State<Arc<DevState>>,
    Form(form): Form<TokenForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    let rejected = || api_error(StatusCode::UNAUTHORIZED, "Incorrect username or password");

    let users = state.users.read().await;
    let user = users.get(&form.username).ok_or_else(rejected)?;
    if !verify_password(&form.password, &user.password_hash) {
        return Err(rejected());
    }

    let access_token = state
        .signer
        .issue(&user.profile.username, state.epoch.load(Ordering::SeqCst))
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    debug!(username = %form.username, "token issued");
    Ok(Json(TokenResponse {
        access_token,
        token_type: Some("bearer".to_string()),
    }))
}

async fn me_handler(Extension(user): Extension<UserProfile>) -> Json<UserProfile> {
    Json(user)
}

#[derive(Deserialize)]
struct RecentParams {
    limit: Option<usize>,
}

async fn recent_handler(
    State(state): State<Arc<DevState>>,
    Query(params): Query<RecentParams>,
) -> Json<Vec<Document>> {
    let limit = params.limit.unwrap_or(DEFAULT_RECENT);
    state.delay(&format!("recent:{limit}")).await;
    let mut docs = state.documents.read().await.clone();
    docs.sort_by(|a, b| b.metadata().modified_date.cmp(&a.metadata().modified_date));
    docs.truncate(limit);
    Json(docs)
}

async fn get_document_handler(
    State(state): State<Arc<DevState>>,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    state.delay(&format!("document:{id}")).await;
    let docs = state.documents.read().await;
    docs.iter()
        .find(|d| d.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                format!("Document with id '{id}' not found."),
            )
        })
}

async fn search_handler(
    State(state): State<Arc<DevState>>,
    Json(req): Json<SearchRequest>,
) -> Json<SearchResponse> {
    state.delay_for(&req).await;
    let docs = state.documents.read().await;
    let matched: Vec<&Document> = docs.iter().filter(|d| matches(d, &req)).collect();
    let hits = matched
        .iter()
        .take(SEARCH_SIZE)
        .map(|d| Hit {
            id: d.id.clone(),
            source: d.source.clone(),
        })
        .collect();
    Json(SearchResponse {
        total: matched.len() as u64,
        hits,
    })
}

async fn export_handler(
    State(state): State<Arc<DevState>>,
    Json(req): Json<SearchRequest>,
) -> impl IntoResponse {
    state.delay_for(&req).await;
    let docs = state.documents.read().await;
    let body = to_csv(docs.iter().filter(|d| matches(d, &req)).take(EXPORT_SIZE));
    let disposition = format!(
        "attachment; filename=corpus_export_{}.csv",
        chrono::Utc::now().format("%Y%m%d")
    );
    (
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
}

fn require_admin(user: &UserProfile) -> Result<(), ApiError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(api_error(
            StatusCode::FORBIDDEN,
            "The user doesn't have enough privileges",
        ))
    }
}

async fn list_users_handler(
    State(state): State<Arc<DevState>>,
    Extension(user): Extension<UserProfile>,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    require_admin(&user)?;
    let mut users: Vec<UserProfile> = state
        .users
        .read()
        .await
        .values()
        .map(|u| u.profile.clone())
        .collect();
    users.sort_by(|a, b| a.username.cmp(&b.username));
    Ok(Json(users))
}

async fn create_user_handler(
    State(state): State<Arc<DevState>>,
    Extension(user): Extension<UserProfile>,
    Json(new_user): Json<NewUser>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    require_admin(&user)?;
    let mut users = state.users.write().await;
    if users.contains_key(&new_user.username) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "The user with this username already exists in the system.",
        ));
    }
    let password_hash = hash_password(&new_user.password)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let profile = UserProfile {
        username: new_user.username.clone(),
        full_name: new_user.full_name,
        role: new_user.role.unwrap_or_else(|| "user".to_string()),
        disabled: false,
    };
    users.insert(
        new_user.username,
        StoredUser {
            profile: profile.clone(),
            password_hash,
        },
    );
    Ok((StatusCode::CREATED, Json(profile)))
}

/// A running stand-in server. Stops when dropped.
pub struct DevServer {
    addr: SocketAddr,
    state: Arc<DevState>,
    task: Option<JoinHandle<()>>,
}

impl DevServer {
    /// Binds an ephemeral port on localhost.
    pub async fn spawn(corpus: Corpus) -> std::io::Result<Self> {
        Self::bind(SocketAddr::from(([127, 0, 0, 1], 0)), corpus).await
    }

    pub async fn bind(addr: SocketAddr, corpus: Corpus) -> std::io::Result<Self> {
        let state = Arc::new(DevState::new(corpus).map_err(std::io::Error::other)?);
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let app = router(state.clone());
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                error!(error = %e, "dev server stopped");
            }
        });
        Ok(Self {
            addr,
            state,
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL for [`crate::ClientConfig`], including the API prefix.
    pub fn base_url(&self) -> String {
        format!("http://{}{}", self.addr, API_PREFIX)
    }

    pub fn state(&self) -> &Arc<DevState> {
        &self.state
    }

    /// Runs until the server task ends.
    pub async fn wait(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for DevServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn token(app: &Router, username: &str, password: &str) -> Response {
        app.clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/auth/token")
                    .method("POST")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from(format!(
                        "username={}&password={}",
                        urlencoding::encode(username),
                        urlencoding::encode(password)
                    )))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn health_and_auth_gate() {
        let app = router(Arc::new(DevState::new(Corpus::demo()).unwrap()));

        let health = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);

        let anonymous = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/documents/doc-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(anonymous).await["detail"],
            "Could not validate credentials"
        );
    }

    #[tokio::test]
    async fn token_then_identity() {
        let app = router(Arc::new(DevState::new(Corpus::demo()).unwrap()));

        assert_eq!(
            token(&app, "admin@corpus.com", "nope").await.status(),
            StatusCode::UNAUTHORIZED
        );

        let ok = token(&app, "admin@corpus.com", "secret").await;
        assert_eq!(ok.status(), StatusCode::OK);
        let access = body_json(ok).await["access_token"]
            .as_str()
            .unwrap()
            .to_string();

        let me = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/auth/users/me")
                    .header("authorization", format!("Bearer {access}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(me.status(), StatusCode::OK);
        let me = body_json(me).await;
        assert_eq!(me["username"], "admin@corpus.com");
        assert_eq!(me["role"], "admin");
    }

    #[tokio::test]
    async fn revoked_tokens_are_refused() {
        let state = Arc::new(DevState::new(Corpus::demo()).unwrap());
        let app = router(state.clone());
        let ok = token(&app, "analyst@corpus.com", "analyst").await;
        let access = body_json(ok).await["access_token"]
            .as_str()
            .unwrap()
            .to_string();

        state.revoke_all();
        let me = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/auth/users/me")
                    .header("authorization", format!("Bearer {access}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
    }
}
