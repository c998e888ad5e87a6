//! Search controller: free-text queries against the corpus index.
//!
//! Results are published through a `watch` channel. Every submission gets a
//! generation number; a response is applied only if no newer search started
//! after it, so a slow stale query can never overwrite newer results.
//!
//! A failed search keeps the previous result set on screen and only sets the
//! error message.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::http::ApiClient;
use crate::models::{Hit, SearchRequest, SearchResponse};

pub const SEARCH_PATH: &str = "/documents/search";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub client_project: Option<String>,
    pub doc_type: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn client_project(mut self, name: impl Into<String>) -> Self {
        self.client_project = Some(name.into());
        self
    }

    pub fn doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    /// Modified-date window: `from` inclusive, `to` exclusive.
    pub fn modified_between(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    pub fn to_request(&self) -> SearchRequest {
        SearchRequest {
            query: Some(self.text.clone()),
            client_project: self.client_project.clone(),
            doc_type: self.doc_type.clone(),
            date_from: self.date_from,
            date_to: self.date_to,
        }
    }
}

impl From<&str> for SearchQuery {
    fn from(text: &str) -> Self {
        SearchQuery::new(text)
    }
}

impl From<String> for SearchQuery {
    fn from(text: String) -> Self {
        SearchQuery::new(text)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchView {
    /// Query whose results are currently shown.
    pub query: Option<SearchQuery>,
    pub hits: Vec<Hit>,
    pub total: u64,
    pub loading: bool,
    pub error: Option<String>,
}

pub struct SearchController {
    api: ApiClient,
    view: watch::Sender<SearchView>,
    generation: AtomicU64,
}

impl SearchController {
    pub fn new(api: ApiClient) -> Self {
        let (view, _rx) = watch::channel(SearchView::default());
        Self {
            api,
            view,
            generation: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> SearchView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchView> {
        self.view.subscribe()
    }

    pub async fn search(&self, query: impl Into<SearchQuery>) {
        let query = query.into();
        let id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.view.send_modify(|view| {
            view.loading = true;
            view.error = None;
        });

        let result: Result<SearchResponse, _> =
            self.api.post_json(SEARCH_PATH, &query.to_request()).await;

        if self.generation.load(Ordering::SeqCst) != id {
            debug!(query = %query.text, "discarding superseded search response");
            return;
        }

        match result {
            Ok(response) => {
                debug!(query = %query.text, hits = response.hits.len(), "search complete");
                self.view.send_modify(|view| {
                    view.total = response.total;
                    view.hits = response.hits;
                    view.query = Some(query);
                    view.loading = false;
                });
            }
            Err(e) => {
                warn!(query = %query.text, error = %e, "search failed");
                self.view.send_modify(|view| {
                    view.loading = false;
                    view.error = Some(e.to_string());
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_query_still_sends_query_field() {
        let req = SearchQuery::from("").to_request();
        assert_eq!(serde_json::to_value(&req).unwrap(), json!({ "query": "" }));
    }

    #[test]
    fn filters_serialize() {
        let from = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let req = SearchQuery::new("lease")
            .client_project("Acme")
            .doc_type("AGMT")
            .modified_between(Some(from), None)
            .to_request();
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["client_project"], "Acme");
        assert_eq!(value["doc_type"], "AGMT");
        assert!(value.get("date_to").is_none());
        assert!(value["date_from"].as_str().unwrap().starts_with("2024-01-01T00:00:00"));
    }
}
