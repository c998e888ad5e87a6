//! Wire types exchanged with the corpus API.
//!
//! Documents and hits arrive in the index's envelope shape
//! (`{"_id": ..., "_source": {"metadata": {...}, "content": ...}}`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity returned by `GET /auth/users/me`; replaced wholesale on each fetch.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub role: String,
    #[serde(default)]
    pub disabled: bool,
}

impl UserProfile {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// Body of `POST /admin/users`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewUser {
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DocumentMetadata {
    pub filename_original: String,
    #[serde(default)]
    pub filename_corpus: Option<String>,
    pub client_project_name: String,
    #[serde(default, with = "timestamp::option")]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(with = "timestamp")]
    pub modified_date: DateTime<Utc>,
    #[serde(default)]
    pub source_hostname: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub modifier: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    /// e.g. AGMT, LTR, MEMO
    #[serde(default)]
    pub doc_type: Option<String>,
    /// e.g. DRAFT, EXECUTED, FILED
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DocumentSource {
    pub metadata: DocumentMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// One search-result entry. Order within a result set is the backend's.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Hit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_source")]
    pub source: DocumentSource,
}

impl Hit {
    pub fn metadata(&self) -> &DocumentMetadata {
        &self.source.metadata
    }
}

/// A full document as returned by `GET /documents/{id}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_source")]
    pub source: DocumentSource,
}

impl Document {
    pub fn metadata(&self) -> &DocumentMetadata {
        &self.source.metadata
    }

    pub fn content(&self) -> &str {
        self.source.content.as_deref().unwrap_or("")
    }
}

/// Body of `POST /documents/search` and `POST /documents/export/csv`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SearchResponse {
    #[serde(default)]
    pub total: u64,
    pub hits: Vec<Hit>,
}

/// Accepts RFC 3339 timestamps, zone-less ISO timestamps (read as UTC) and
/// epoch seconds, integral or fractional, as sent by the ingest agent.
pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Seconds(i64),
        FractionalSeconds(f64),
    }

    impl Raw {
        fn into_datetime<E: serde::de::Error>(self) -> Result<DateTime<Utc>, E> {
            match self {
                Raw::Text(raw) => parse(&raw)
                    .ok_or_else(|| E::custom(format!("invalid timestamp: {raw}"))),
                Raw::Seconds(secs) => DateTime::from_timestamp(secs, 0)
                    .ok_or_else(|| E::custom(format!("timestamp out of range: {secs}"))),
                Raw::FractionalSeconds(secs) => from_fractional(secs)
                    .ok_or_else(|| E::custom(format!("timestamp out of range: {secs}"))),
            }
        }
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    fn from_fractional(secs: f64) -> Option<DateTime<Utc>> {
        if !secs.is_finite() {
            return None;
        }
        let whole = secs.floor();
        let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
        DateTime::from_timestamp(whole as i64, nanos)
    }

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        Raw::deserialize(d)?.into_datetime()
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(dt: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => s.serialize_str(&dt.to_rfc3339()),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<Raw>::deserialize(d)?
                .map(Raw::into_datetime)
                .transpose()
        }
    }
}
