//! Plain-text rendering of hits, documents and users for the terminal.

use std::fmt::Write;

use crate::models::{Document, Hit, UserProfile};

const NOT_AVAILABLE: &str = "N/A";

fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    let header: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    let _ = writeln!(out, "{}", line(&header));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", line(&rule));
    for row in rows {
        let _ = writeln!(out, "{}", line(row));
    }
    out
}

fn or_na(value: &Option<String>) -> String {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .unwrap_or(NOT_AVAILABLE)
        .to_string()
}

/// Search/recent results in backend order.
pub fn hits_table(hits: &[Hit]) -> String {
    if hits.is_empty() {
        return "No documents found.\n".to_string();
    }
    let rows: Vec<Vec<String>> = hits
        .iter()
        .map(|hit| {
            let meta = hit.metadata();
            vec![
                hit.id.clone(),
                meta.filename_original.clone(),
                meta.client_project_name.clone(),
                or_na(&meta.doc_type),
                meta.modified_date.format("%Y-%m-%d").to_string(),
            ]
        })
        .collect();
    table(
        &["ID", "Filename", "Client/Project", "Doc Type", "Modified Date"],
        &rows,
    )
}

pub fn document_view(doc: &Document) -> String {
    let meta = doc.metadata();
    let mut out = String::new();
    let _ = writeln!(out, "{}", meta.filename_original);
    let _ = writeln!(out, "{}", "=".repeat(meta.filename_original.chars().count()));
    let _ = writeln!(out, "Client/Project: {}", meta.client_project_name);
    let _ = writeln!(
        out,
        "Modified Date:  {}",
        meta.modified_date.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "Document Type:  {}", or_na(&meta.doc_type));
    let _ = writeln!(out, "Status:         {}", or_na(&meta.status));
    out.push('\n');
    out.push_str(doc.content());
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

pub fn users_table(users: &[UserProfile]) -> String {
    let rows: Vec<Vec<String>> = users
        .iter()
        .map(|u| {
            vec![
                u.full_name.clone().unwrap_or_default(),
                u.username.clone(),
                u.role.clone(),
                if u.disabled { "Disabled" } else { "Active" }.to_string(),
            ]
        })
        .collect();
    table(&["Full Name", "Email (Username)", "Role", "Status"], &rows)
}
