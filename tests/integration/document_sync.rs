//! Integration tests for the registry and full document sync

use crate::integration::test_utils::{documents_dir, refresher_for, MemoryStore};
use rulekeeper::document::DocumentState;
use rulekeeper::error::ApiError;
use rulekeeper::manifest::KnowledgeBase;
use rulekeeper::registry::DocumentRegistry;
use rulekeeper::sync::sync_documents;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_sync_replaces_remote_files_and_writes_manifest() {
    let dir = documents_dir(&["a.pdf", "b.pdf", "c.pdf"]);
    let store = MemoryStore::new();
    let old = store.seed("old.pdf");
    store.fail_upload("c.pdf");
    let manifest = dir.path().join("kb").join("knowledge_base.json");

    let report = sync_documents(
        &DocumentRegistry::new(store.clone()),
        &refresher_for(store.clone()),
        dir.path(),
        &manifest,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.deleted, 1);
    assert_eq!(store.deleted(), vec![old]);
    assert_eq!(report.uris.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].0.ends_with("c.pdf"));

    let kb = KnowledgeBase::load(&manifest).unwrap();
    assert_eq!(kb.uris().to_vec(), report.uris);
}

#[tokio::test]
async fn test_sync_without_documents_dir_leaves_manifest_alone() {
    let dir = documents_dir(&[]);
    let store = MemoryStore::new();
    let manifest = dir.path().join("knowledge_base.json");

    let err = sync_documents(
        &DocumentRegistry::new(store.clone()),
        &refresher_for(store),
        &dir.path().join("missing"),
        &manifest,
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ApiError::ConfigError(_)));
    assert!(!manifest.exists());
}

#[tokio::test]
async fn test_registry_lists_active_documents() {
    let store = MemoryStore::new();
    store.seed("manual.pdf");
    store.seed("addendum.pdf");
    let registry = DocumentRegistry::new(store);

    let documents = registry.list().await.unwrap();
    assert_eq!(documents.len(), 2);
    assert!(documents.iter().all(|d| d.state() == DocumentState::Active));
    assert!(documents.iter().all(|d| d.local_path().is_none()));
    assert_eq!(registry.active_uris().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_registry_delete_of_unknown_handle_is_ok() {
    let store = MemoryStore::new();
    let registry = DocumentRegistry::new(store.clone());
    registry.delete("files/never-existed").await.unwrap();
    assert!(store.deleted().is_empty());
}
