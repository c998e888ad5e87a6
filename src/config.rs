//! Client configuration, read from the environment (and `.env` via dotenvy).

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";
pub const DEFAULT_TOKEN_FILE: &str = ".corpus_token";
pub const DEFAULT_EXPORT_FILENAME: &str = "corpus_export.csv";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub token_file: PathBuf,
    /// `None` leaves the transport default in place.
    pub timeout: Option<Duration>,
    pub export_dir: PathBuf,
    pub default_export_filename: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            timeout: None,
            export_dir: PathBuf::from("."),
            default_export_filename: DEFAULT_EXPORT_FILENAME.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::default().with_base_url(base_url)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Loads `.env` if present, then reads `CORPUS_*` variables over the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(url) = lookup("CORPUS_API_URL") {
            config = config.with_base_url(url);
        }
        if let Some(path) = lookup("CORPUS_TOKEN_FILE") {
            config.token_file = PathBuf::from(path);
        }
        if let Some(dir) = lookup("CORPUS_EXPORT_DIR") {
            config.export_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("CORPUS_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "CORPUS_TIMEOUT_SECS",
                value: raw.clone(),
            })?;
            config.timeout = Some(Duration::from_secs(secs));
        }
        Ok(config)
    }

    /// Joins an API path onto the base URL with exactly one separator.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.token_file, PathBuf::from(".corpus_token"));
        assert!(config.timeout.is_none());
        assert_eq!(config.default_export_filename, "corpus_export.csv");
    }

    #[test]
    fn env_overrides_and_trailing_slash() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("CORPUS_API_URL", "http://corpus.internal/api/v1/"),
            ("CORPUS_TIMEOUT_SECS", "15"),
            ("CORPUS_TOKEN_FILE", "/tmp/tok"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://corpus.internal/api/v1");
        assert_eq!(config.timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.token_file, PathBuf::from("/tmp/tok"));
        assert_eq!(
            config.url("/documents/search"),
            "http://corpus.internal/api/v1/documents/search"
        );
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let err = ClientConfig::from_lookup(lookup(&[("CORPUS_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "CORPUS_TIMEOUT_SECS",
                value: "soon".into()
            }
        );
    }
}
