//! corpus-client: client-side access layer for the Corpus document service.
//!
//! Owns the session lifecycle (token acquisition, persistence, verification,
//! invalidation) and the query/export pipeline on top of it:
//! - `http`: single outbound adapter; attaches the bearer token, reports 401/403 to the session.
//! - `session` + `auth`: session state machine and its operations.
//! - `guard`: route gating on session state.
//! - `search`, `recent`, `documents`, `export`, `admin`: controllers over the API.
//!
//! ```no_run
//! use std::sync::Arc;
//! use corpus_client::{ApiClient, ClientConfig, FileTokenStore, SearchController, SessionContext, SessionStore};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! let store = Arc::new(FileTokenStore::new(config.token_file.clone()));
//! let session = SessionContext::restore(store).await?;
//! let api = ApiClient::new(config, session)?;
//!
//! let sessions = SessionStore::new(api.clone());
//! sessions.login("admin@corpus.com", "secret").await?;
//! sessions.verify().await?;
//!
//! let search = SearchController::new(api);
//! search.search("invoice").await;
//! println!("{} hits", search.snapshot().hits.len());
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod auth;
pub mod config;
pub mod documents;
pub mod error;
pub mod export;
pub mod guard;
pub mod http;
pub mod models;
pub mod recent;
pub mod render;
pub mod search;
pub mod session;
pub mod task;
pub mod token_store;

// Stand-in backend for tests and local runs
#[cfg(feature = "dev-server")]
pub mod dev_server;

pub use admin::AdminClient;
pub use auth::SessionStore;
pub use config::ClientConfig;
pub use documents::{DocumentController, DocumentView};
pub use error::{AuthError, ConfigError, ExportError, FetchError, TransportError};
pub use export::{suggested_filename, ExportController, ExportedFile};
pub use guard::{Access, GuardWatch, Route, RouteGuard};
pub use http::{ApiClient, RequestBody, RequestOptions};
pub use models::{Document, DocumentMetadata, Hit, NewUser, UserProfile};
pub use recent::{RecentDocuments, RecentView};
pub use search::{SearchController, SearchQuery, SearchView};
pub use session::{Session, SessionContext, SessionState};
pub use task::TaskGuard;
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
