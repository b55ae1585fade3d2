//! Rulekeeper: question answering over a fixed set of reference documents.
//!
//! Context documents are uploaded to a hosted model's file store and referenced from each
//! generation request. When a request fails the executor refreshes expired context or steps
//! down to cheaper models before giving up.

pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod executor;
pub mod logging;
pub mod manifest;
pub mod provider;
pub mod refresher;
pub mod registry;
pub mod search;
pub mod sync;
pub mod tiers;
pub mod uploader;
