//! Context documents and their processing lifecycle.
//!
//! A [`Document`] mirrors one file held by the remote store. Its state only moves forward
//! (`Pending` → `Processing` → `Active | Failed`) and its URI is present exactly when the
//! state is `Active`; the fields are private so that every change goes through a transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Processing state of a context document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentState {
    Pending,
    Processing,
    Active,
    Failed,
}

impl DocumentState {
    /// `Active` and `Failed` accept no further automatic transition
    pub fn is_terminal(self) -> bool {
        matches!(self, DocumentState::Active | DocumentState::Failed)
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DocumentState::Pending => "PENDING",
            DocumentState::Processing => "PROCESSING",
            DocumentState::Active => "ACTIVE",
            DocumentState::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// State as reported by the remote file store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteFileState {
    #[default]
    StateUnspecified,
    Processing,
    Active,
    Failed,
}

impl fmt::Display for RemoteFileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RemoteFileState::StateUnspecified => "STATE_UNSPECIFIED",
            RemoteFileState::Processing => "PROCESSING",
            RemoteFileState::Active => "ACTIVE",
            RemoteFileState::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// File record as returned by the remote store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    /// Opaque handle, e.g. `files/abc-123`
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub state: RemoteFileState,
    #[serde(default)]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expiration_time: Option<DateTime<Utc>>,
}

/// One uploaded context file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    local_path: Option<PathBuf>,
    mime_type: String,
    display_name: String,
    remote_handle: Option<String>,
    uri: Option<String>,
    state: DocumentState,
    created_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
}

impl Document {
    /// New document for a local file about to be uploaded.
    /// The display name defaults to the file name.
    pub fn pending(
        local_path: impl Into<PathBuf>,
        mime_type: impl Into<String>,
        display_name: Option<String>,
    ) -> Self {
        let local_path = local_path.into();
        let display_name = display_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| file_name_of(&local_path));
        Self {
            local_path: Some(local_path),
            mime_type: mime_type.into(),
            display_name,
            remote_handle: None,
            uri: None,
            state: DocumentState::Pending,
            created_at: None,
            expires_at: None,
        }
    }

    /// Document known only through the remote store (no local source file)
    pub fn from_remote(file: &RemoteFile) -> Self {
        let mut doc = Self {
            local_path: None,
            mime_type: file.mime_type.clone().unwrap_or_default(),
            display_name: file
                .display_name
                .clone()
                .unwrap_or_else(|| file.name.clone()),
            remote_handle: Some(file.name.clone()),
            uri: None,
            state: DocumentState::Processing,
            created_at: file.create_time,
            expires_at: file.expiration_time,
        };
        doc.observe(file);
        doc
    }

    /// The store acknowledged receipt and assigned a handle
    pub fn acknowledge(&mut self, handle: impl Into<String>) {
        if self.state == DocumentState::Pending {
            self.remote_handle = Some(handle.into());
            self.state = DocumentState::Processing;
        }
    }

    /// Fold the store's latest view of this document into its state.
    ///
    /// Terminal states are sticky. An `ACTIVE` report without a URI is treated as a failure,
    /// since the document cannot be referenced from a generation request.
    pub fn observe(&mut self, file: &RemoteFile) {
        if self.state.is_terminal() {
            return;
        }
        if self.remote_handle.is_none() {
            self.remote_handle = Some(file.name.clone());
        }
        if file.create_time.is_some() {
            self.created_at = file.create_time;
        }
        if file.expiration_time.is_some() {
            self.expires_at = file.expiration_time;
        }
        match (file.state, file.uri.as_deref()) {
            (RemoteFileState::Processing, _) => self.state = DocumentState::Processing,
            (RemoteFileState::Active, Some(uri)) if !uri.is_empty() => {
                self.uri = Some(uri.to_string());
                self.state = DocumentState::Active;
            }
            _ => {
                self.uri = None;
                self.state = DocumentState::Failed;
            }
        }
    }

    pub fn local_path(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn remote_handle(&self) -> Option<&str> {
        self.remote_handle.as_deref()
    }

    /// Reference usable in a generation request; `Some` only while `Active`
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn state(&self) -> DocumentState {
        self.state
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
