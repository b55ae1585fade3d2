//! Integration tests for expired-context recovery

use crate::integration::test_utils::{
    documents_dir, refresher_for, MemoryStore, Reply, ScriptedModel, PDF,
};
use rulekeeper::error::ErrorClass;
use rulekeeper::executor::{AttemptOutcome, QueryExecutor};
use rulekeeper::tiers::{ModelLadder, ModelTiers};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const FLASH: &str = "gemini-2.5-flash";

fn executor(model: Arc<ScriptedModel>, store: Arc<MemoryStore>, dir: &Path) -> QueryExecutor {
    let ladder = ModelLadder::new(ModelTiers::new(
        "gemini-2.5-pro",
        FLASH,
        "gemini-2.5-flash-lite",
    ));
    QueryExecutor::new(model, ladder, PDF).with_refresher(refresher_for(store), dir)
}

fn stale() -> Vec<String> {
    vec!["https://store.test/files/expired".to_string()]
}

#[tokio::test]
async fn test_refresh_keeps_partial_successes_in_scan_order() {
    let dir = documents_dir(&["c.pdf", "a.pdf", "b.pdf", "notes.txt"]);
    let store = MemoryStore::new();
    store.fail_upload("b.pdf");

    let uris = refresher_for(store.clone())
        .refresh(dir.path(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(store.uploads(), vec!["a.pdf", "b.pdf", "c.pdf"]);
    assert_eq!(
        uris,
        vec![
            "https://store.test/v1beta/files/f1".to_string(),
            "https://store.test/v1beta/files/f2".to_string(),
        ]
    );
    assert_eq!(store.file_count(), 2);
}

#[tokio::test]
async fn test_expired_context_retries_same_model_with_fresh_uris() {
    let dir = documents_dir(&["a.pdf", "b.pdf"]);
    let store = MemoryStore::new();
    let model = ScriptedModel::new();
    model.script(FLASH, [Reply::Fail(403, "PERMISSION_DENIED: file expired")]);

    let answer = executor(model.clone(), store.clone(), dir.path())
        .query("q", &stale(), Some(FLASH))
        .await
        .unwrap();

    assert_eq!(answer, format!("answer from {}", FLASH));
    let calls = model.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].file_uris, stale());
    assert_eq!(calls[1].model, FLASH);
    assert_eq!(calls[1].file_uris.len(), 2);
    assert!(!calls[1].file_uris.contains(&stale()[0]));
}

#[tokio::test]
async fn test_empty_refresh_surfaces_original_error() {
    let dir = documents_dir(&[]);
    let store = MemoryStore::new();
    let model = ScriptedModel::new();
    model.script(FLASH, [Reply::Fail(404, "NOT_FOUND: files/expired")]);

    let run = executor(model.clone(), store.clone(), dir.path())
        .run("q", &stale(), Some(FLASH), &CancellationToken::new())
        .await;

    assert_eq!(run.result.as_ref().unwrap_err().status(), Some(404));
    assert_eq!(model.calls().len(), 1);
    assert!(store.uploads().is_empty());
    assert!(!run.refreshed());
    assert_eq!(run.attempts.len(), 1);
    assert_eq!(
        run.attempts[0].outcome,
        AttemptOutcome::Fatal(ErrorClass::ContextInvalid)
    );
}

#[tokio::test]
async fn test_refresh_happens_at_most_once_per_query() {
    let dir = documents_dir(&["a.pdf"]);
    let store = MemoryStore::new();
    let model = ScriptedModel::new();
    model.script(
        FLASH,
        [
            Reply::Fail(404, "NOT_FOUND"),
            Reply::Fail(404, "NOT_FOUND: still missing"),
        ],
    );

    let err = executor(model.clone(), store.clone(), dir.path())
        .query("q", &stale(), Some(FLASH))
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::ContextInvalid);
    assert!(err.to_string().contains("still missing"));
    assert_eq!(model.calls().len(), 2);
    assert_eq!(store.uploads(), vec!["a.pdf"]);
}

#[tokio::test]
async fn test_refresh_then_capacity_fallback_keeps_fresh_context() {
    let dir = documents_dir(&["a.pdf"]);
    let store = MemoryStore::new();
    let model = ScriptedModel::new();
    model.script(
        FLASH,
        [
            Reply::Fail(404, "NOT_FOUND"),
            Reply::Fail(429, "RESOURCE_EXHAUSTED"),
        ],
    );

    executor(model.clone(), store, dir.path())
        .query("q", &stale(), Some(FLASH))
        .await
        .unwrap();

    let calls = model.calls();
    assert_eq!(model.models_called(), vec![FLASH, FLASH, "gemini-2.5-flash-lite"]);
    assert_eq!(calls[1].file_uris, calls[2].file_uris);
}

#[tokio::test]
async fn test_missing_documents_dir_yields_empty_refresh() {
    let store = MemoryStore::new();
    let uris = refresher_for(store)
        .refresh(Path::new("/nonexistent/rulekeeper-docs"), &CancellationToken::new())
        .await
        .unwrap();
    assert!(uris.is_empty());
}

#[tokio::test]
async fn test_refreshed_context_carries_over_to_next_query() {
    let dir = documents_dir(&["a.pdf", "b.pdf"]);
    let store = MemoryStore::new();
    let model = ScriptedModel::new();
    model.expire(&stale()[0]);
    let executor = executor(model.clone(), store.clone(), dir.path());
    let cancel = CancellationToken::new();

    let first = executor.run("q1", &stale(), Some(FLASH), &cancel).await;
    assert!(first.result.is_ok());
    assert!(first.refreshed());
    let fresh = first.context().unwrap().to_vec();
    assert_eq!(fresh.len(), 2);

    let second = executor.run("q2", &fresh, Some(FLASH), &cancel).await;
    assert!(second.result.is_ok());
    assert!(!second.refreshed());
    assert_eq!(second.context(), Some(fresh.as_slice()));

    assert_eq!(store.uploads(), vec!["a.pdf", "b.pdf"]);
    assert_eq!(store.file_count(), 2);
    assert_eq!(model.calls().len(), 3);
}
