//! Wire types for `POST /process-fix`.

use serde::{Deserialize, Serialize};

/// Broken code (or a GitHub link to it) and the error it produced.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FixRequest {
    pub code: String,
    pub error_log: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Success,
    Error,
}

/// One human-readable progress message.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogEntry {
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub message: String,
}

/// The outer status is always `success`; failures are reported through `logs` and `fixed_code`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FixResponse {
    pub status: ResponseStatus,
    pub logs: Vec<LogEntry>,
    pub fixed_code: String,
}

/// Append-only record of the steps a request went through.
#[derive(Debug, Default)]
pub struct StepLog {
    entries: Vec<LogEntry>,
}

impl StepLog {
    pub fn info(&mut self, message: impl Into<String>) {
        self.push(LogKind::Info, message.into());
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(LogKind::Success, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(LogKind::Error, message.into());
    }

    fn push(&mut self, kind: LogKind, message: String) {
        self.entries.push(LogEntry { kind, message });
    }

    pub fn into_response(self, fixed_code: String) -> FixResponse {
        FixResponse {
            status: ResponseStatus::Success,
            logs: self.entries,
            fixed_code,
        }
    }
}
