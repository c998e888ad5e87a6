//! Route guard: gates the protected views on session state.

use std::fmt;

use tokio::sync::watch;

use crate::session::{Session, SessionContext, SessionState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard,
    Search,
    Document(String),
    AdminUsers,
}

impl Route {
    pub fn parse(path: &str) -> Option<Route> {
        let path = path.split(['?', '#']).next().unwrap_or("");
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] => Some(Route::Dashboard),
            ["login"] => Some(Route::Login),
            ["search"] => Some(Route::Search),
            ["document", id] => urlencoding::decode(id)
                .ok()
                .map(|id| Route::Document(id.into_owned())),
            ["admin", "users"] => Some(Route::AdminUsers),
            _ => None,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::Dashboard => "/".to_string(),
            Route::Search => "/search".to_string(),
            Route::Document(id) => format!("/document/{}", urlencoding::encode(id)),
            Route::AdminUsers => "/admin/users".to_string(),
        }
    }

    pub fn is_protected(&self) -> bool {
        !matches!(self, Route::Login)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Render(Route),
    Redirect(Route),
}

impl Access {
    pub fn is_redirect(&self) -> bool {
        matches!(self, Access::Redirect(_))
    }
}

pub struct RouteGuard;

impl RouteGuard {
    /// Pending verification renders optimistically; only a session without a
    /// usable token is sent to the login page. A signed-in user asking for the
    /// login page lands on the dashboard.
    pub fn check(route: &Route, state: SessionState) -> Access {
        let signed_in = matches!(
            state,
            SessionState::Authenticated | SessionState::PendingVerification
        );
        match (route.is_protected(), signed_in) {
            (true, true) => Access::Render(route.clone()),
            (true, false) => Access::Redirect(Route::Login),
            (false, true) => Access::Redirect(Route::Dashboard),
            (false, false) => Access::Render(route.clone()),
        }
    }

    pub fn watch(session: &SessionContext, route: Route) -> GuardWatch {
        GuardWatch {
            route,
            rx: session.subscribe(),
        }
    }
}

/// Re-evaluates one route every time the session changes.
pub struct GuardWatch {
    route: Route,
    rx: watch::Receiver<Session>,
}

impl GuardWatch {
    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn current(&self) -> Access {
        RouteGuard::check(&self.route, self.rx.borrow().state())
    }

    /// Next decision after a session change; `None` once the session is gone.
    pub async fn changed(&mut self) -> Option<Access> {
        self.rx.changed().await.ok()?;
        let state = self.rx.borrow_and_update().state();
        Some(RouteGuard::check(&self.route, state))
    }

    /// Resolves with the redirect target as soon as access is revoked.
    pub async fn until_redirect(&mut self) -> Option<Route> {
        loop {
            if let Access::Redirect(to) = self.current() {
                return Some(to);
            }
            self.rx.changed().await.ok()?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserProfile;
    use crate::token_store::MemoryTokenStore;
    use std::sync::Arc;

    #[test]
    fn parse_and_path() {
        assert_eq!(Route::parse("/"), Some(Route::Dashboard));
        assert_eq!(Route::parse("/search?q=x"), Some(Route::Search));
        assert_eq!(Route::parse("/login"), Some(Route::Login));
        assert_eq!(Route::parse("/admin/users/"), Some(Route::AdminUsers));
        assert_eq!(
            Route::parse("/document/doc%2042"),
            Some(Route::Document("doc 42".into()))
        );
        assert_eq!(Route::parse("/browse"), None);
        assert_eq!(Route::Document("doc 42".into()).path(), "/document/doc%2042");
    }

    #[test]
    fn protected_routes_by_state() {
        use SessionState::*;
        let search = Route::Search;
        assert_eq!(RouteGuard::check(&search, Authenticated), Access::Render(Route::Search));
        assert_eq!(
            RouteGuard::check(&search, PendingVerification),
            Access::Render(Route::Search)
        );
        assert_eq!(RouteGuard::check(&search, Anonymous), Access::Redirect(Route::Login));
        assert_eq!(RouteGuard::check(&search, Invalid), Access::Redirect(Route::Login));
    }

    #[test]
    fn login_page_access() {
        assert_eq!(
            RouteGuard::check(&Route::Login, SessionState::Anonymous),
            Access::Render(Route::Login)
        );
        assert_eq!(
            RouteGuard::check(&Route::Login, SessionState::Authenticated),
            Access::Redirect(Route::Dashboard)
        );
    }

    #[tokio::test]
    async fn watch_reacts_to_invalidation() {
        let ctx = SessionContext::new(Arc::new(MemoryTokenStore::new()));
        ctx.set_token("t".into()).await.unwrap();
        ctx.set_user_if_current(
            "t",
            UserProfile {
                username: "u".into(),
                full_name: None,
                role: "user".into(),
                disabled: false,
            },
        );

        let mut guard = RouteGuard::watch(&ctx, Route::Document("doc-1".into()));
        assert_eq!(guard.current(), Access::Render(Route::Document("doc-1".into())));

        let waiter = tokio::spawn(async move { guard.until_redirect().await });
        ctx.clear_if_current("t").await;
        assert_eq!(waiter.await.unwrap(), Some(Route::Login));
    }
}
