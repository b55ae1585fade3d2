//! Integration tests for capacity fallback across model tiers

use crate::integration::test_utils::{Reply, ScriptedModel, PDF};
use rulekeeper::error::{ApiError, ErrorClass};
use rulekeeper::executor::{AttemptOutcome, QueryExecutor};
use rulekeeper::tiers::{ModelLadder, ModelTiers};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const PRO: &str = "gemini-2.5-pro";
const FLASH: &str = "gemini-2.5-flash";
const LITE: &str = "gemini-2.5-flash-lite";

fn executor(model: Arc<ScriptedModel>, primary: &str) -> QueryExecutor {
    QueryExecutor::new(model, ModelLadder::new(ModelTiers::new(primary, FLASH, LITE)), PDF)
}

fn context() -> Vec<String> {
    vec!["https://store.test/files/a".to_string()]
}

#[tokio::test]
async fn test_overloaded_pro_steps_down_to_flash() {
    let model = ScriptedModel::new();
    model.script(PRO, [Reply::Fail(503, "UNAVAILABLE: model overloaded")]);
    model.script(FLASH, [Reply::Answer("Bumpers are required.")]);

    let answer = executor(model.clone(), PRO)
        .query("Are bumpers required?", &context(), None)
        .await
        .unwrap();

    assert_eq!(answer, "Bumpers are required.");
    assert_eq!(model.models_called(), vec![PRO, FLASH]);
}

#[tokio::test]
async fn test_last_tier_failure_is_the_one_surfaced() {
    let model = ScriptedModel::new();
    model.script(FLASH, [Reply::Fail(429, "RESOURCE_EXHAUSTED: quota")]);
    model.script(LITE, [Reply::Fail(500, "INTERNAL: lite broke")]);

    let err = executor(model.clone(), FLASH)
        .query("q", &context(), None)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("lite broke"), "got {}", err);
    assert_eq!(model.models_called(), vec![FLASH, LITE]);
}

#[tokio::test]
async fn test_economy_primary_has_nowhere_to_go() {
    let model = ScriptedModel::new();
    model.script(LITE, [Reply::Fail(429, "RESOURCE_EXHAUSTED")]);

    let err = executor(model.clone(), LITE)
        .query("q", &context(), None)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(429));
    assert_eq!(model.models_called(), vec![LITE]);
}

#[tokio::test]
async fn test_pro_exhausts_every_tier() {
    let model = ScriptedModel::new();
    model.script(PRO, [Reply::Fail(503, "UNAVAILABLE")]);
    model.script(FLASH, [Reply::Fail(429, "RESOURCE_EXHAUSTED")]);
    model.script(LITE, [Reply::Fail(429, "RESOURCE_EXHAUSTED: lite quota")]);

    let run = executor(model.clone(), PRO)
        .run("q", &context(), None, &CancellationToken::new())
        .await;

    assert_eq!(model.models_called(), vec![PRO, FLASH, LITE]);
    let err = run.result.unwrap_err();
    assert!(err.to_string().contains("lite quota"));
    assert_eq!(
        run.attempts.last().map(|a| a.outcome.clone()),
        Some(AttemptOutcome::Fatal(ErrorClass::CapacityExceeded))
    );
}

#[tokio::test]
async fn test_fallback_keeps_context_unchanged() {
    let model = ScriptedModel::new();
    model.script(PRO, [Reply::Fail(503, "UNAVAILABLE")]);

    executor(model.clone(), PRO)
        .query("q", &context(), None)
        .await
        .unwrap();

    let calls = model.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].file_uris, calls[1].file_uris);
    assert_eq!(calls[1].question.as_deref(), Some("q"));
}

#[tokio::test]
async fn test_model_hint_overrides_primary() {
    let model = ScriptedModel::new();

    let answer = executor(model.clone(), FLASH)
        .query("q", &context(), Some(PRO))
        .await
        .unwrap();

    assert_eq!(answer, format!("answer from {}", PRO));
}

#[tokio::test]
async fn test_fatal_error_is_not_retried() {
    let model = ScriptedModel::new();
    model.script(PRO, [Reply::Fail(400, "INVALID_ARGUMENT: bad request")]);

    let err = executor(model.clone(), PRO)
        .query("q", &context(), None)
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::Fatal);
    assert_eq!(model.models_called(), vec![PRO]);
}

#[tokio::test]
async fn test_cancelled_before_first_attempt() {
    let model = ScriptedModel::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = executor(model.clone(), PRO)
        .query_with_cancel("q", &context(), None, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Cancelled));
    assert!(model.calls().is_empty());
}
