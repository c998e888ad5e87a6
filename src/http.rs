//! HTTP client adapter: the single point of outbound requests.
//!
//! Attaches the session's current bearer token to every request, maps
//! failures onto [`TransportError`] and reports credential rejections back to
//! the session.

use std::sync::Arc;

use reqwest::header::ACCEPT;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::session::SessionContext;

const MAX_DETAIL_LEN: usize = 200;

#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    /// Sent as `application/x-www-form-urlencoded`.
    Form(Vec<(String, String)>),
}

#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Overrides the `Accept` header, e.g. for binary export streams.
    pub accept: Option<&'static str>,
    /// Treat 403 as an authorization refusal rather than a revoked session.
    /// 401 always invalidates.
    pub keep_session_on_forbidden: bool,
}

impl RequestOptions {
    pub fn stream(accept: &'static str) -> Self {
        Self {
            accept: Some(accept),
            ..Self::default()
        }
    }

    pub fn authorization_only() -> Self {
        Self {
            keep_session_on_forbidden: true,
            ..Self::default()
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    config: Arc<ClientConfig>,
    session: SessionContext,
}

impl ApiClient {
    pub fn new(config: ClientConfig, session: SessionContext) -> Result<Self, TransportError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;
        Ok(Self {
            http,
            config: Arc::new(config),
            session,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Sends one request. Non-2xx statuses come back as
    /// `TransportError::Status`; a 401 (or 403, unless the options say
    /// otherwise) clears the session if the rejected token is still current.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> Result<Response, TransportError> {
        let token = self.session.token();
        let url = self.config.url(path);

        let mut req = self.http.request(method.clone(), &url);
        if let Some(token) = &token {
            req = req.bearer_auth(token);
        }
        if let Some(accept) = options.accept {
            req = req.header(ACCEPT, accept);
        }
        req = match body {
            RequestBody::Empty => req,
            RequestBody::Json(value) => req.json(&value),
            RequestBody::Form(pairs) => req.form(&pairs),
        };

        debug!(%method, path, authenticated = token.is_some(), "corpus request");
        let response = req
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let code = status.as_u16();
        let detail = error_detail(response).await;
        debug!(%method, path, code, ?detail, "corpus request failed");

        let revoked = code == 401 || (code == 403 && !options.keep_session_on_forbidden);
        if revoked {
            if let Some(token) = &token {
                if self.session.clear_if_current(token).await {
                    warn!(path, code, "session rejected by server, logged out");
                }
            }
        }
        Err(TransportError::Status { code, detail })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        self.get_json_with(path, RequestOptions::default()).await
    }

    pub async fn get_json_with<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, TransportError> {
        let response = self
            .request(Method::GET, path, RequestBody::Empty, options)
            .await?;
        decode(response).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.post_json_with(path, body, RequestOptions::default()).await
    }

    pub async fn post_json_with<B, T>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::POST, path, json_body(body)?, options)
            .await?;
        decode(response).await
    }

    pub async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        fields: &[(&str, &str)],
    ) -> Result<T, TransportError> {
        let pairs = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let response = self
            .request(
                Method::POST,
                path,
                RequestBody::Form(pairs),
                RequestOptions::default(),
            )
            .await?;
        decode(response).await
    }

    /// POSTs a JSON body and hands back the raw response for byte streaming.
    /// The status has already been checked, so the body is the payload and
    /// never an error document.
    pub async fn post_stream<B>(
        &self,
        path: &str,
        body: &B,
        accept: &'static str,
    ) -> Result<Response, TransportError>
    where
        B: Serialize + ?Sized,
    {
        self.request(
            Method::POST,
            path,
            json_body(body)?,
            RequestOptions::stream(accept),
        )
        .await
    }
}

fn json_body<B: Serialize + ?Sized>(body: &B) -> Result<RequestBody, TransportError> {
    serde_json::to_value(body)
        .map(RequestBody::Json)
        .map_err(|e| TransportError::Decode(format!("request body: {e}")))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| TransportError::Unreachable(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()))
}

/// Pulls a human-readable reason out of an error response: the `detail`
/// field of a JSON body, or a short plain-text body.
async fn error_detail(response: Response) -> Option<String> {
    let text = response.text().await.ok()?;
    parse_detail(&text)
}

fn parse_detail(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
        return value
            .get("detail")
            .and_then(|d| d.as_str())
            .map(str::to_string);
    }
    (text.len() <= MAX_DETAIL_LEN).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_from_json_body() {
        assert_eq!(
            parse_detail(r#"{"detail":"Could not validate credentials"}"#).as_deref(),
            Some("Could not validate credentials")
        );
        assert_eq!(parse_detail(r#"{"error":"x"}"#), None);
    }

    #[test]
    fn detail_from_short_text_only() {
        assert_eq!(parse_detail(" Bad Gateway \n").as_deref(), Some("Bad Gateway"));
        assert_eq!(parse_detail(""), None);
        assert_eq!(parse_detail(&"x".repeat(MAX_DETAIL_LEN + 1)), None);
    }

    #[test]
    fn option_presets() {
        let stream = RequestOptions::stream("text/csv");
        assert_eq!(stream.accept, Some("text/csv"));
        assert!(!stream.keep_session_on_forbidden);
        assert!(RequestOptions::authorization_only().keep_session_on_forbidden);
    }
}
