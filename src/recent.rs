//! Recently received documents, as listed on the dashboard.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::http::ApiClient;
use crate::models::Hit;
use crate::task::TaskGuard;

pub const RECENT_PATH: &str = "/documents/recent";
pub const DEFAULT_REFRESH: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct RecentView {
    pub hits: Vec<Hit>,
    pub loading: bool,
    pub error: Option<String>,
}

impl Default for RecentView {
    fn default() -> Self {
        Self {
            hits: Vec::new(),
            loading: true,
            error: None,
        }
    }
}

pub struct RecentDocuments {
    api: ApiClient,
    view: watch::Sender<RecentView>,
    generation: AtomicU64,
}

impl RecentDocuments {
    pub fn new(api: ApiClient) -> Self {
        let (view, _rx) = watch::channel(RecentView::default());
        Self {
            api,
            view,
            generation: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> RecentView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RecentView> {
        self.view.subscribe()
    }

    /// Only the most recently started load may update the view; an older
    /// load that finishes late is dropped.
    pub async fn load(&self, limit: usize) {
        let id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let path = format!("{RECENT_PATH}?limit={limit}");
        let result = self.api.get_json::<Vec<Hit>>(&path).await;

        if self.generation.load(Ordering::SeqCst) != id {
            debug!(limit, "discarding superseded recent documents response");
            return;
        }

        match result {
            Ok(hits) => self.view.send_modify(|view| {
                view.hits = hits;
                view.loading = false;
                view.error = None;
            }),
            Err(e) => {
                warn!(error = %e, "could not load recent files");
                self.view.send_modify(|view| {
                    view.loading = false;
                    view.error = Some(e.to_string());
                });
            }
        }
    }

    /// Loads now and then every `every` until the guard is dropped.
    pub fn spawn_refresh(self: &Arc<Self>, limit: usize, every: Duration) -> TaskGuard {
        let this = Arc::clone(self);
        TaskGuard::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                this.load(limit).await;
            }
        })
    }
}
