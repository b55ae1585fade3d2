//! Fallback-tiered query executor.
//!
//! Sends a question plus the current context set to the model and recovers from failures:
//!
//! - `ContextInvalid`: re-upload the local documents once per call and retry the same
//!   model with the fresh URIs. An empty refresh surfaces the original error.
//! - `CapacityExceeded`: walk the [`ModelLadder`] computed from the model that first hit
//!   the limit, keeping the context set unchanged. The last error is surfaced when the
//!   ladder runs out.
//! - `Fatal`: surfaced immediately.
//!
//! Attempts are strictly sequential. Every retry is a new billable request, so callers
//! must not loop on this without their own backoff.

use crate::error::{ApiError, ErrorClass};
use crate::provider::{ContentPart, GenerativeModel};
use crate::refresher::ContextRefresher;
use crate::tiers::ModelLadder;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of one generation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success(String),
    /// Failed, and the executor recovered by refreshing or stepping down
    Retryable(ErrorClass),
    /// Failed, and the error was surfaced
    Fatal(ErrorClass),
}

/// Record of one generation attempt within a single query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryAttempt {
    pub model: String,
    pub context: Vec<String>,
    pub outcome: AttemptOutcome,
}

/// Full trace of a query: every attempt plus the final result
#[derive(Debug)]
pub struct QueryRun {
    pub question: String,
    pub attempts: Vec<QueryAttempt>,
    pub result: Result<String, ApiError>,
}

impl QueryRun {
    /// Context set sent with the last attempt. Differs from the caller's set after a refresh.
    pub fn context(&self) -> Option<&[String]> {
        self.attempts.last().map(|attempt| attempt.context.as_slice())
    }

    pub fn refreshed(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| a.outcome == AttemptOutcome::Retryable(ErrorClass::ContextInvalid))
    }
}

pub struct QueryExecutor {
    model: Arc<dyn GenerativeModel>,
    ladder: ModelLadder,
    mime_type: String,
    refresher: Option<(ContextRefresher, PathBuf)>,
}

impl QueryExecutor {
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        ladder: ModelLadder,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            model,
            ladder,
            mime_type: mime_type.into(),
            refresher: None,
        }
    }

    /// Enable context refresh from `documents_dir` on `ContextInvalid` errors
    pub fn with_refresher(
        mut self,
        refresher: ContextRefresher,
        documents_dir: impl Into<PathBuf>,
    ) -> Self {
        self.refresher = Some((refresher, documents_dir.into()));
        self
    }

    pub fn ladder(&self) -> &ModelLadder {
        &self.ladder
    }

    /// Answer `question` against `context_uris`.
    ///
    /// `model_hint` overrides the configured primary model.
    pub async fn query(
        &self,
        question: &str,
        context_uris: &[String],
        model_hint: Option<&str>,
    ) -> Result<String, ApiError> {
        self.query_with_cancel(question, context_uris, model_hint, &CancellationToken::new())
            .await
    }

    /// Like [`query`](Self::query); once `cancel` fires no further attempt starts and any
    /// in-flight refresh stops polling.
    pub async fn query_with_cancel(
        &self,
        question: &str,
        context_uris: &[String],
        model_hint: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String, ApiError> {
        self.run(question, context_uris, model_hint, cancel)
            .await
            .result
    }

    /// Execute the query and return every attempt made along the way
    pub async fn run(
        &self,
        question: &str,
        context_uris: &[String],
        model_hint: Option<&str>,
        cancel: &CancellationToken,
    ) -> QueryRun {
        let mut attempts = Vec::new();
        let result = self
            .execute(question, context_uris, model_hint, cancel, &mut attempts)
            .await;
        QueryRun {
            question: question.to_string(),
            attempts,
            result,
        }
    }

    async fn execute(
        &self,
        question: &str,
        context_uris: &[String],
        model_hint: Option<&str>,
        cancel: &CancellationToken,
        attempts: &mut Vec<QueryAttempt>,
    ) -> Result<String, ApiError> {
        let mut model = model_hint
            .filter(|hint| !hint.trim().is_empty())
            .unwrap_or(&self.ladder.tiers().primary)
            .to_string();
        let mut context = context_uris.to_vec();
        let mut refreshed = false;
        let mut fallbacks: Option<VecDeque<String>> = None;

        loop {
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            info!(model = %model, context_files = context.len(), "Generating answer");
            let parts = self.build_parts(question, &context);
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ApiError::Cancelled),
                result = self.model.generate(&model, &parts) => result,
            };

            let err = match result {
                Ok(answer) => {
                    attempts.push(QueryAttempt {
                        model,
                        context,
                        outcome: AttemptOutcome::Success(answer.clone()),
                    });
                    return Ok(answer);
                }
                Err(ApiError::Cancelled) => return Err(ApiError::Cancelled),
                Err(err) => err,
            };

            let class = err.class();
            warn!(model = %model, class = ?class, error = %err, "Generation failed");

            match class {
                ErrorClass::ContextInvalid if !refreshed && self.refresher.is_some() => {
                    refreshed = true;
                    let fresh = match &self.refresher {
                        Some((refresher, dir)) => refresher.refresh(dir, cancel).await?,
                        None => Vec::new(),
                    };
                    if fresh.is_empty() {
                        warn!("Context refresh produced no documents, giving up");
                        attempts.push(QueryAttempt {
                            model,
                            context,
                            outcome: AttemptOutcome::Fatal(class),
                        });
                        return Err(err);
                    }
                    info!(model = %model, context_files = fresh.len(), "Retrying with refreshed context");
                    attempts.push(QueryAttempt {
                        model: model.clone(),
                        context: std::mem::replace(&mut context, fresh),
                        outcome: AttemptOutcome::Retryable(class),
                    });
                }
                ErrorClass::CapacityExceeded => {
                    let plan = fallbacks
                        .get_or_insert_with(|| self.ladder.fallbacks(&model).into());
                    match plan.pop_front() {
                        Some(next) => {
                            info!(from = %model, to = %next, "Falling back to cheaper model");
                            attempts.push(QueryAttempt {
                                model: std::mem::replace(&mut model, next),
                                context: context.clone(),
                                outcome: AttemptOutcome::Retryable(class),
                            });
                        }
                        None => {
                            debug!(model = %model, "No fallback models left");
                            attempts.push(QueryAttempt {
                                model,
                                context,
                                outcome: AttemptOutcome::Fatal(class),
                            });
                            return Err(err);
                        }
                    }
                }
                _ => {
                    attempts.push(QueryAttempt {
                        model,
                        context,
                        outcome: AttemptOutcome::Fatal(class),
                    });
                    return Err(err);
                }
            }
        }
    }

    fn build_parts(&self, question: &str, context: &[String]) -> Vec<ContentPart> {
        context
            .iter()
            .map(|uri| ContentPart::file(self.mime_type.clone(), uri.clone()))
            .chain(std::iter::once(ContentPart::text(question)))
            .collect()
    }
}
