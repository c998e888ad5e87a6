//! User administration endpoints (admin role required server-side).
//!
//! A 403 here means "not an admin", not a revoked session, so these calls
//! keep the session on 403.

use tracing::info;

use crate::error::FetchError;
use crate::http::{ApiClient, RequestOptions};
use crate::models::{NewUser, UserProfile};

pub const USERS_PATH: &str = "/admin/users";

pub struct AdminClient {
    api: ApiClient,
}

impl AdminClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn list_users(&self) -> Result<Vec<UserProfile>, FetchError> {
        self.api
            .get_json_with(USERS_PATH, RequestOptions::authorization_only())
            .await
            .map_err(|e| FetchError::from_transport(USERS_PATH, e))
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<UserProfile, FetchError> {
        let created: UserProfile = self
            .api
            .post_json_with(USERS_PATH, user, RequestOptions::authorization_only())
            .await
            .map_err(|e| FetchError::from_transport(&user.username, e))?;
        info!(username = %created.username, "user created");
        Ok(created)
    }
}
