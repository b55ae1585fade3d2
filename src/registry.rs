//! Document registry: live view of the documents held by the remote store.
//!
//! Nothing is cached; every call goes to the store. Callers that need a stable set of
//! known-good URIs keep it in the knowledge-base manifest.

use crate::document::{Document, DocumentState};
use crate::error::ApiError;
use crate::provider::FileStore;
use std::sync::Arc;
use tracing::{debug, info};

pub struct DocumentRegistry {
    store: Arc<dyn FileStore>,
}

impl DocumentRegistry {
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self { store }
    }

    /// All documents currently in the store; empty when it holds nothing
    pub async fn list(&self) -> Result<Vec<Document>, ApiError> {
        let files = self.store.list().await?;
        debug!(count = files.len(), "Listed remote files");
        Ok(files.iter().map(Document::from_remote).collect())
    }

    /// URIs of every `Active` document, in store order
    pub async fn active_uris(&self) -> Result<Vec<String>, ApiError> {
        Ok(self
            .list()
            .await?
            .iter()
            .filter(|doc| doc.state() == DocumentState::Active)
            .filter_map(|doc| doc.uri().map(str::to_string))
            .collect())
    }

    /// Remove one document. A handle the store no longer knows about is not an error.
    pub async fn delete(&self, remote_handle: &str) -> Result<(), ApiError> {
        match self.store.delete(remote_handle).await {
            Ok(()) => {
                info!(handle = %remote_handle, "Deleted remote file");
                Ok(())
            }
            Err(err) if err.status() == Some(404) => {
                debug!(handle = %remote_handle, "Remote file already absent");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}
