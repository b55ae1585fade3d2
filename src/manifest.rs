//! Knowledge-base manifest: the persisted context set, a JSON array of document URIs.
//!
//! Written by a full sync and read by hosts at startup as the initial context set.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnowledgeBase {
    uris: Vec<String>,
}

impl KnowledgeBase {
    pub fn new(uris: Vec<String>) -> Self {
        Self { uris }
    }

    /// Read the manifest. A missing file is an empty knowledge base, not an error.
    pub fn load(path: &Path) -> Result<Self, ApiError> {
        if !path.exists() {
            warn!(
                manifest = %path.display(),
                "Knowledge base manifest not found; no context until synced"
            );
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let kb: KnowledgeBase = serde_json::from_str(&contents).map_err(|e| {
            ApiError::Manifest(format!("{} is not a JSON array of URIs: {}", path.display(), e))
        })?;
        info!(count = kb.uris.len(), "Loaded file URIs from knowledge base");
        Ok(kb)
    }

    pub fn save(&self, path: &Path) -> Result<(), ApiError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ApiError::Manifest(format!("Failed to serialize manifest: {}", e)))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Replace the URI set and persist it. Returns `false` without writing when unchanged.
    pub fn update(&mut self, uris: &[String], path: &Path) -> Result<bool, ApiError> {
        if self.uris == uris {
            return Ok(false);
        }
        self.uris = uris.to_vec();
        self.save(path)?;
        info!(count = self.uris.len(), manifest = %path.display(), "Knowledge base updated");
        Ok(true)
    }

    pub fn uris(&self) -> &[String] {
        &self.uris
    }

    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }

    pub fn len(&self) -> usize {
        self.uris.len()
    }
}
