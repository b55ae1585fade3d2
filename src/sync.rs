//! Full document sync: replace every remote file with a fresh upload of the local
//! documents directory and rewrite the knowledge-base manifest.

use crate::error::ApiError;
use crate::manifest::KnowledgeBase;
use crate::refresher::ContextRefresher;
use crate::registry::DocumentRegistry;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Summary of a completed sync
#[derive(Debug, Default)]
pub struct SyncReport {
    pub deleted: usize,
    pub uris: Vec<String>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Delete all remote files, upload every document in `documents_dir`, and write the
/// successful URIs to `manifest_path` (an empty array when nothing was uploaded).
///
/// A failed delete or a missing documents directory aborts before the manifest is touched.
/// Individual upload failures are reported and skipped.
pub async fn sync_documents(
    registry: &DocumentRegistry,
    refresher: &ContextRefresher,
    documents_dir: &Path,
    manifest_path: &Path,
    cancel: &CancellationToken,
) -> Result<SyncReport, ApiError> {
    let mut report = SyncReport::default();

    let existing = registry.list().await?;
    info!(count = existing.len(), "Deleting existing remote files");
    for document in &existing {
        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        if let Some(handle) = document.remote_handle() {
            info!(display_name = %document.display_name(), handle, "Deleting remote file");
            registry.delete(handle).await?;
            report.deleted += 1;
        }
    }

    if !documents_dir.is_dir() {
        return Err(ApiError::ConfigError(format!(
            "documents directory not found at {}",
            documents_dir.display()
        )));
    }

    let outcome = refresher.upload_all(documents_dir, cancel).await?;
    report.uris = outcome.uris();
    report.failed = outcome.failed;

    KnowledgeBase::new(report.uris.clone()).save(manifest_path)?;
    info!(
        uploaded = report.uris.len(),
        failed = report.failed.len(),
        manifest = %manifest_path.display(),
        "Sync complete"
    );
    Ok(report)
}
