//! Integration tests for the rulekeeper question-answering service


mod context_refresh;
mod document_sync;
mod model_fallback;
