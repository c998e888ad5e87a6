//! Single-document retrieval for the document view.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::http::ApiClient;
use crate::models::Document;

#[derive(Debug, Clone, Default)]
pub struct DocumentView {
    pub id: Option<String>,
    pub document: Option<Document>,
    pub loading: bool,
    pub error: Option<String>,
}

pub struct DocumentController {
    api: ApiClient,
    view: watch::Sender<DocumentView>,
    generation: AtomicU64,
}

impl DocumentController {
    pub fn new(api: ApiClient) -> Self {
        let (view, _rx) = watch::channel(DocumentView::default());
        Self {
            api,
            view,
            generation: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> DocumentView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DocumentView> {
        self.view.subscribe()
    }

    /// Navigation entry point: fetches only when `id` differs from the
    /// document already shown or loading. Returns `None` when nothing ran.
    pub async fn open(&self, id: &str) -> Option<Result<Document, FetchError>> {
        if self.view.borrow().id.as_deref() == Some(id) {
            return None;
        }
        Some(self.fetch(id).await)
    }

    /// Always issues the request. The previous document is cleared before
    /// the request goes out, so a failure never shows stale content.
    pub async fn fetch(&self, id: &str) -> Result<Document, FetchError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.view.send_replace(DocumentView {
            id: Some(id.to_string()),
            document: None,
            loading: true,
            error: None,
        });

        let path = format!("/documents/{}", urlencoding::encode(id));
        let result = self
            .api
            .get_json::<Document>(&path)
            .await
            .map_err(|e| FetchError::from_transport(id, e));

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(id, "discarding superseded document response");
            return result;
        }

        match &result {
            Ok(document) => self.view.send_modify(|view| {
                view.document = Some(document.clone());
                view.loading = false;
            }),
            Err(e) => {
                warn!(id, error = %e, "failed to fetch document");
                self.view.send_modify(|view| {
                    view.loading = false;
                    view.error = Some(e.to_string());
                });
            }
        }
        result
    }
}
