//! Document uploader: pushes a local file to the remote store and waits for processing.
//!
//! The store has no push notification, so the uploader polls the file's state at a fixed
//! interval. The number of polls is bounded and the wait observes a cancellation token.

use crate::config::UploadConfig;
use crate::document::{Document, DocumentState};
use crate::error::ApiError;
use crate::provider::FileStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long to wait for the store to finish processing an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Polls after the initial state fetch before giving up with `TimedOut`
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&UploadConfig::default())
    }
}

impl From<&UploadConfig> for PollPolicy {
    fn from(config: &UploadConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.poll_interval_ms),
            max_attempts: config.max_poll_attempts,
        }
    }
}

/// Uploads documents and polls them to a terminal state
pub struct DocumentUploader {
    store: Arc<dyn FileStore>,
    policy: PollPolicy,
}

impl DocumentUploader {
    pub fn new(store: Arc<dyn FileStore>, policy: PollPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Upload `path` and wait until the store reports a terminal state.
    ///
    /// Returns the `Active` document with its URI populated. A non-active terminal state
    /// yields `ProcessingFailed`; running out of polls yields `TimedOut`; a cancelled token
    /// yields `Cancelled` without issuing further requests.
    pub async fn upload(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Document, ApiError> {
        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        let mut document =
            Document::pending(path, mime_type, display_name.map(str::to_string));

        let submitted = self
            .store
            .upload(path, mime_type, document.display_name())
            .await?;
        document.acknowledge(submitted.name.clone());
        let handle = submitted.name;

        info!(
            display_name = %document.display_name(),
            handle = %handle,
            "Uploaded file"
        );

        let mut file = self.store.get(&handle).await?;
        document.observe(&file);

        let mut attempts = 0u32;
        while document.state() == DocumentState::Processing {
            if attempts >= self.policy.max_attempts {
                warn!(handle = %handle, attempts, "File still processing, giving up");
                return Err(ApiError::TimedOut { handle, attempts });
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(handle = %handle, "Upload polling cancelled");
                    return Err(ApiError::Cancelled);
                }
                _ = tokio::time::sleep(self.policy.interval) => {}
            }

            attempts += 1;
            file = self.store.get(&handle).await?;
            document.observe(&file);
            debug!(handle = %handle, attempt = attempts, state = %file.state, "Polled file state");
        }

        if document.state() != DocumentState::Active {
            return Err(ApiError::ProcessingFailed {
                handle,
                state: file.state.to_string(),
            });
        }

        info!(
            handle = %handle,
            uri = document.uri().unwrap_or_default(),
            "File processing complete"
        );
        Ok(document)
    }
}
