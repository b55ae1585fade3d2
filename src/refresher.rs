//! Context refresher: re-uploads the local documents to obtain a fresh context set.
//!
//! Used when the model rejects the current URIs as missing or expired. The batch is
//! partial-success: a file that fails to upload is logged and skipped, and whatever
//! succeeded is returned, possibly nothing. Stale remote files are left in place.

use crate::config::DocumentsConfig;
use crate::document::Document;
use crate::error::ApiError;
use crate::uploader::DocumentUploader;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use walkdir::WalkDir;

/// Result of uploading every document in a directory
#[derive(Debug, Default)]
pub struct RefreshOutcome {
    /// Documents that reached `Active`, in scan order
    pub uploaded: Vec<Document>,
    /// Files whose upload failed, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

impl RefreshOutcome {
    /// URIs of the uploaded documents, in scan order
    pub fn uris(&self) -> Vec<String> {
        self.uploaded
            .iter()
            .filter_map(|doc| doc.uri().map(str::to_string))
            .collect()
    }
}

pub struct ContextRefresher {
    uploader: DocumentUploader,
    extension: String,
    mime_type: String,
}

impl ContextRefresher {
    pub fn new(
        uploader: DocumentUploader,
        extension: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            uploader,
            extension: extension.into().trim_start_matches('.').to_string(),
            mime_type: mime_type.into(),
        }
    }

    pub fn from_config(uploader: DocumentUploader, documents: &DocumentsConfig) -> Self {
        Self::new(uploader, documents.extension.clone(), documents.mime_type.clone())
    }

    /// Files directly inside `dir` with the configured extension, sorted by file name.
    /// Subdirectories are not descended into.
    pub fn scan(&self, dir: &Path) -> Result<Vec<PathBuf>, ApiError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| {
                ApiError::Io(e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::Other,
                        format!("cannot read {}", dir.display()),
                    )
                }))
            })?;
            if entry.file_type().is_file() && self.matches_extension(entry.path()) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case(&self.extension))
    }

    /// Upload every matching file in `dir`.
    ///
    /// Only an unreadable directory or cancellation fails the batch; per-file failures are
    /// collected in the outcome.
    pub async fn upload_all(
        &self,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<RefreshOutcome, ApiError> {
        let files = self.scan(dir)?;
        info!(dir = %dir.display(), count = files.len(), "Uploading context documents");

        let mut outcome = RefreshOutcome::default();
        for path in files {
            let display_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
            match self
                .uploader
                .upload(&path, &self.mime_type, display_name.as_deref(), cancel)
                .await
            {
                Ok(document) => outcome.uploaded.push(document),
                Err(ApiError::Cancelled) => return Err(ApiError::Cancelled),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Failed to upload document, skipping");
                    outcome.failed.push((path, err.to_string()));
                }
            }
        }
        Ok(outcome)
    }

    /// Re-upload the documents in `dir` and return the fresh URIs in scan order.
    ///
    /// Never fails for the batch as a whole; an unreadable directory yields an empty set.
    /// The only error is `Cancelled`.
    pub async fn refresh(
        &self,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ApiError> {
        match self.upload_all(dir, cancel).await {
            Ok(outcome) => {
                let uris = outcome.uris();
                info!(
                    refreshed = uris.len(),
                    failed = outcome.failed.len(),
                    "Context refresh complete"
                );
                Ok(uris)
            }
            Err(ApiError::Cancelled) => Err(ApiError::Cancelled),
            Err(err) => {
                error!(dir = %dir.display(), error = %err, "Context refresh could not scan documents");
                Ok(Vec::new())
            }
        }
    }
}
