//! HTTP relay that asks an LLM to repair broken code.
//!
//! `POST /process-fix` takes a code snippet (or a GitHub link to one) together with its error
//! log, hands both to the configured model, and answers with the suggested fix plus a log of the
//! steps taken. This crate is normally used through the `codefix-server` binary.

pub mod cli;
pub mod pipeline;
pub mod server;
pub mod types;

pub use pipeline::FixPipeline;
pub use server::serve;
pub use types::{FixRequest, FixResponse, LogEntry, LogKind};
