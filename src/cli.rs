//! CLI domain: parse, route and presentation only.
//! Route handlers build the components and delegate; no orchestration lives here.

mod parse;
mod presentation;
mod route;

pub use parse::{Cli, Commands, FileCommands};
pub use presentation::{format_documents, format_sync_report, map_error};
pub use route::RunContext;
