//! Error taxonomy for the corpus client.
//!
//! Every variant renders a message that can be shown to the user as-is.

use thiserror::Error;

/// Failure of a single HTTP exchange.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection refused, DNS failure, timeout, broken body stream.
    #[error("corpus API unreachable: {0}")]
    Unreachable(String),

    /// Server answered with a non-2xx status.
    #[error("corpus API returned {code}{}", .detail.as_ref().map(|d| format!(": {d}")).unwrap_or_default())]
    Status { code: u16, detail: Option<String> },

    /// 2xx response whose body did not match the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// 401 or 403: the session's credential was refused.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Bad credentials, or a token the identity endpoint refused.
    #[error("login rejected: check your username and password")]
    Rejected,

    #[error("authentication service unreachable: {0}")]
    Unreachable(String),

    /// Server error or malformed answer; says nothing about the credentials.
    #[error("authentication service failed: {0}")]
    Unavailable(String),

    /// The token could not be written to or removed from local storage.
    #[error("token storage failed: {0}")]
    Storage(String),
}

impl From<TransportError> for AuthError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Status {
                code: 400 | 401 | 403,
                ..
            } => AuthError::Rejected,
            TransportError::Unreachable(msg) => AuthError::Unreachable(msg),
            other => AuthError::Unavailable(other.to_string()),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("document '{0}' not found")]
    NotFound(String),

    #[error("you do not have permission to view this resource")]
    Forbidden,

    /// Session was rejected mid-use; it has already been cleared.
    #[error("session expired, please log in again")]
    Unauthorized,

    #[error(transparent)]
    Transport(TransportError),
}

impl FetchError {
    /// Classifies a transport failure for the resource named `id`.
    pub fn from_transport(id: &str, err: TransportError) -> Self {
        match err.status() {
            Some(404) => FetchError::NotFound(id.to_string()),
            Some(403) => FetchError::Forbidden,
            Some(401) => FetchError::Unauthorized,
            _ => FetchError::Transport(err),
        }
    }
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("export failed: {0}")]
    Transport(#[from] TransportError),

    #[error("could not write export file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}
