//! CLI presentation: text formatting for command results and errors.

use crate::document::Document;
use crate::error::ApiError;
use crate::sync::SyncReport;

/// Map domain errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::ConfigError(msg) => format!("Configuration error: {}", msg),
        other => other.to_string(),
    }
}

pub fn format_documents(documents: &[Document]) -> String {
    if documents.is_empty() {
        return "No files found.".to_string();
    }
    let mut s = String::from("Found files:");
    for doc in documents {
        s.push_str(&format!("\n- Display Name: {}", doc.display_name()));
        s.push_str(&format!("\n  Name: {}", doc.remote_handle().unwrap_or("-")));
        s.push_str(&format!("\n  URI: {}", doc.uri().unwrap_or("-")));
        s.push_str(&format!("\n  State: {}", doc.state()));
        if let Some(created) = doc.created_at() {
            s.push_str(&format!("\n  Created: {}", created.to_rfc3339()));
        }
        if let Some(expires) = doc.expires_at() {
            s.push_str(&format!("\n  Expires: {}", expires.to_rfc3339()));
        }
    }
    s
}

pub fn format_sync_report(report: &SyncReport) -> String {
    let mut s = format!(
        "Sync complete.\n  Deleted: {}\n  Knowledge base updated with {} files.",
        report.deleted,
        report.uris.len()
    );
    if !report.failed.is_empty() {
        s.push_str(&format!("\n\nFailed uploads ({}):", report.failed.len()));
        for (path, reason) in &report.failed {
            s.push_str(&format!("\n  - {}: {}", path.display(), reason));
        }
    }
    s
}
