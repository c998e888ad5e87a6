//! CSV export of a search, streamed straight to disk.
//!
//! The body is written to a hidden `.part` file in the destination directory
//! and renamed to the server-suggested filename once the stream completes.
//! If anything fails the partial file is removed, so repeated exports leave
//! nothing behind.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::CONTENT_DISPOSITION;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::error::{ExportError, TransportError};
use crate::http::ApiClient;
use crate::search::SearchQuery;

pub const EXPORT_CSV_PATH: &str = "/documents/export/csv";
const CSV_ACCEPT: &str = "text/csv, application/octet-stream";

static EXTENDED_FILENAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)filename\*\s*=\s*([^']*)'[^']*'([^;\s]+)").unwrap());
static PLAIN_FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)filename[^;=\n*]*=\s*(?:"([^"]*)"|'([^']*)'|([^;\n]*))"#).unwrap()
});

/// Filename suggested by a `Content-Disposition` header. The RFC 5987
/// `filename*` form wins over plain `filename`. Directory components are
/// stripped; `None` means the caller should fall back to its default.
pub fn suggested_filename(header: Option<&str>) -> Option<String> {
    let header = header?;

    let extended = EXTENDED_FILENAME.captures(header).and_then(|caps| {
        let charset = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let raw = caps.get(2)?.as_str();
        if charset.is_empty() || charset.eq_ignore_ascii_case("utf-8") {
            urlencoding::decode(raw).ok().map(|s| s.into_owned())
        } else {
            Some(raw.to_string())
        }
    });
    if let Some(name) = extended.as_deref().and_then(sanitize) {
        return Some(name);
    }

    let caps = PLAIN_FILENAME.captures(header)?;
    let raw = caps.get(1).or(caps.get(2)).or(caps.get(3))?.as_str();
    sanitize(raw)
}

fn sanitize(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();
    let name = name.trim_matches(|c| c == '"' || c == '\'');
    match name {
        "" | "." | ".." => None,
        _ => Some(name.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub path: PathBuf,
    pub filename: String,
    pub bytes: u64,
}

pub struct ExportController {
    api: ApiClient,
    default_filename: String,
}

impl ExportController {
    pub fn new(api: ApiClient) -> Self {
        let default_filename = api.config().default_export_filename.clone();
        Self {
            api,
            default_filename,
        }
    }

    /// Runs `query` against the export endpoint and saves the result in
    /// `dest_dir`. Does not touch any search state.
    pub async fn export_csv(
        &self,
        query: impl Into<SearchQuery>,
        dest_dir: &Path,
    ) -> Result<ExportedFile, ExportError> {
        let query = query.into();
        let response = self
            .api
            .post_stream(EXPORT_CSV_PATH, &query.to_request(), CSV_ACCEPT)
            .await
            .inspect_err(|e| warn!(query = %query.text, error = %e, "CSV export failed"))?;

        let disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok());
        let filename =
            suggested_filename(disposition).unwrap_or_else(|| self.default_filename.clone());

        tokio::fs::create_dir_all(dest_dir).await?;
        let target = dest_dir.join(&filename);
        let mut partial = PartialFile::create(dest_dir).await?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TransportError::Unreachable(e.to_string()))?;
            partial.write(&chunk).await?;
        }
        let bytes = partial.persist(&target).await?;

        info!(path = %target.display(), bytes, "export saved");
        Ok(ExportedFile {
            path: target,
            filename,
            bytes,
        })
    }
}

/// Download in progress. Removed on drop unless persisted.
struct PartialFile {
    path: PathBuf,
    file: Option<File>,
    written: u64,
}

impl PartialFile {
    async fn create(dir: &Path) -> std::io::Result<Self> {
        let path = dir.join(format!(".{}.part", uuid::Uuid::new_v4()));
        let file = File::create(&path).await?;
        Ok(Self {
            path,
            file: Some(file),
            written: 0,
        })
    }

    async fn write(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.write_all(chunk).await?;
            self.written += chunk.len() as u64;
        }
        Ok(())
    }

    async fn persist(mut self, target: &Path) -> std::io::Result<u64> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&self.path, target).await?;
        // Renamed away; nothing left for Drop to clean up.
        self.path = PathBuf::new();
        Ok(self.written)
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        self.file.take();
        if !self.path.as_os_str().is_empty() {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_filename() {
        assert_eq!(
            suggested_filename(Some(r#"attachment; filename="q4_report.csv""#)).as_deref(),
            Some("q4_report.csv")
        );
    }

    #[test]
    fn unquoted_and_single_quoted() {
        assert_eq!(
            suggested_filename(Some("attachment; filename=corpus_export_20240102.csv")).as_deref(),
            Some("corpus_export_20240102.csv")
        );
        assert_eq!(
            suggested_filename(Some("attachment; filename='a b.csv'; size=10")).as_deref(),
            Some("a b.csv")
        );
    }

    #[test]
    fn extended_form_preferred() {
        let header = r#"attachment; filename="fallback.csv"; filename*=UTF-8''r%C3%A9sum%C3%A9.csv"#;
        assert_eq!(suggested_filename(Some(header)).as_deref(), Some("résumé.csv"));
    }

    #[test]
    fn missing_or_unusable_header() {
        assert_eq!(suggested_filename(None), None);
        assert_eq!(suggested_filename(Some("attachment")), None);
        assert_eq!(suggested_filename(Some(r#"attachment; filename="""#)), None);
    }

    #[test]
    fn path_components_are_stripped() {
        assert_eq!(
            suggested_filename(Some(r#"attachment; filename="../../etc/passwd""#)).as_deref(),
            Some("passwd")
        );
        assert_eq!(
            suggested_filename(Some(r#"attachment; filename="..""#)),
            None
        );
    }

    #[tokio::test]
    async fn partial_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let mut partial = PartialFile::create(dir.path()).await.unwrap();
        partial.write(b"half").await.unwrap();
        let path = partial.path.clone();
        assert!(path.exists());
        drop(partial);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn persisted_file_survives() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.csv");
        let mut partial = PartialFile::create(dir.path()).await.unwrap();
        partial.write(b"a,b\n").await.unwrap();
        assert_eq!(partial.persist(&target).await.unwrap(), 4);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "a,b\n");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
