//! Seed data and query evaluation for the stand-in backend.

use chrono::{DateTime, TimeZone, Utc};

use crate::models::{Document, DocumentMetadata, DocumentSource, SearchRequest, UserProfile};

pub const CSV_HEADERS: [&str; 7] = [
    "Corpus Filename",
    "Original Filename",
    "Client/Project",
    "Doc Type",
    "Status",
    "Modified Date",
    "Language",
];

/// Users and documents a server starts with.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub users: Vec<(UserProfile, String)>,
    pub documents: Vec<Document>,
}

impl Corpus {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Demo data: an admin (`admin@corpus.com` / `secret`), an analyst
    /// (`analyst@corpus.com` / `analyst`) and six documents. Three mention
    /// "invoice", two mention "contract".
    pub fn demo() -> Self {
        Self::empty()
            .with_user(user("admin@corpus.com", "Admin User", "admin"), "secret")
            .with_user(user("analyst@corpus.com", "Ana Lyst", "user"), "analyst")
            .with_document(doc(
                "doc-1",
                "invoice_2024_001.pdf",
                "Acme Corp",
                Some("INV"),
                Some("FILED"),
                (2024, 1, 10),
                "Invoice 001 for consulting services rendered in December.",
            ))
            .with_document(doc(
                "doc-2",
                "invoice_2024_002.pdf",
                "Acme Corp",
                Some("INV"),
                Some("FILED"),
                (2024, 2, 12),
                "Invoice 002 covering January retainer.",
            ))
            .with_document(doc(
                "doc-3",
                "globex_invoice.pdf",
                "Globex",
                Some("INV"),
                None,
                (2024, 3, 3),
                "Final invoice for the Globex migration project.",
            ))
            .with_document(doc(
                "doc-4",
                "services_agreement.docx",
                "Acme Corp",
                Some("AGMT"),
                Some("EXECUTED"),
                (2024, 4, 18),
                "Master services contract between Acme Corp and the firm.",
            ))
            .with_document(doc(
                "doc-5",
                "mutual_nda.docx",
                "Initech",
                Some("AGMT"),
                Some("DRAFT"),
                (2024, 5, 2),
                "Mutual non-disclosure contract, second draft.",
            ))
            .with_document(doc(
                "doc-6",
                "q4_planning.txt",
                "Globex",
                Some("MEMO"),
                None,
                (2024, 6, 21),
                "Q4 planning memo: staffing and budget.",
            ))
    }

    pub fn with_user(mut self, profile: UserProfile, password: impl Into<String>) -> Self {
        self.users.push((profile, password.into()));
        self
    }

    pub fn with_document(mut self, document: Document) -> Self {
        self.documents.push(document);
        self
    }
}

fn user(username: &str, full_name: &str, role: &str) -> UserProfile {
    UserProfile {
        username: username.to_string(),
        full_name: Some(full_name.to_string()),
        role: role.to_string(),
        disabled: false,
    }
}

fn at(ymd: (i32, u32, u32)) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(ymd.0, ymd.1, ymd.2, 9, 30, 0)
        .single()
        .unwrap_or_default()
}

pub fn doc(
    id: &str,
    filename: &str,
    client_project: &str,
    doc_type: Option<&str>,
    status: Option<&str>,
    modified: (i32, u32, u32),
    content: &str,
) -> Document {
    Document {
        id: id.to_string(),
        source: DocumentSource {
            metadata: DocumentMetadata {
                filename_original: filename.to_string(),
                filename_corpus: Some(format!("{id}_{filename}")),
                client_project_name: client_project.to_string(),
                created_date: Some(at(modified)),
                modified_date: at(modified),
                source_hostname: Some("fs01".to_string()),
                creator: None,
                modifier: None,
                language: Some("en".to_string()),
                doc_type: doc_type.map(str::to_string),
                status: status.map(str::to_string),
            },
            content: Some(content.to_string()),
        },
    }
}

/// Case-insensitive substring match over content, filename and
/// client/project, plus exact-match filters and a modified-date window.
pub fn matches(doc: &Document, req: &SearchRequest) -> bool {
    let meta = doc.metadata();
    if let Some(query) = req.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let needle = query.to_lowercase();
        let hit = [
            doc.content(),
            meta.filename_original.as_str(),
            meta.client_project_name.as_str(),
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle));
        if !hit {
            return false;
        }
    }
    if let Some(project) = &req.client_project {
        if &meta.client_project_name != project {
            return false;
        }
    }
    if let Some(doc_type) = &req.doc_type {
        if meta.doc_type.as_ref() != Some(doc_type) {
            return false;
        }
    }
    if req.date_from.is_some_and(|from| meta.modified_date < from) {
        return false;
    }
    if req.date_to.is_some_and(|to| meta.modified_date >= to) {
        return false;
    }
    true
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn to_csv<'a>(docs: impl IntoIterator<Item = &'a Document>) -> String {
    let mut out = CSV_HEADERS.join(",");
    out.push_str("\r\n");
    for doc in docs {
        let meta = doc.metadata();
        let row = [
            meta.filename_corpus.clone().unwrap_or_default(),
            meta.filename_original.clone(),
            meta.client_project_name.clone(),
            meta.doc_type.clone().unwrap_or_default(),
            meta.status.clone().unwrap_or_default(),
            meta.modified_date.to_rfc3339(),
            meta.language.clone().unwrap_or_default(),
        ];
        let line: Vec<String> = row.iter().map(|v| csv_field(v)).collect();
        out.push_str(&line.join(","));
        out.push_str("\r\n");
    }
    out
}
