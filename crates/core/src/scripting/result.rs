//! Execution outcomes.

use serde::Serialize;
use serde_json::Value;

use crate::types::UnitId;

/// Terminal status of one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Completed,
    Failed,
    /// The unit was already pending; nothing was scheduled.
    SkippedDuplicate,
}

/// Why an execution failed.
///
/// Script-level failures and transport failures are kept apart so that
/// "the script is buggy" can be told from "the interpreter is down".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptFailure {
    /// The script raised an error.
    #[error("Script error: {message}")]
    Script { message: String },

    /// The embedded script panicked.
    #[error("Script panicked: {message}")]
    Panicked { message: String },

    /// The external interpreter could not be reached or answered garbage.
    #[error("Gateway transport error: {message}")]
    Transport { message: String },

    /// The gateway call did not finish in time.
    #[error("Gateway call timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// Abandoned because the manager shut down without draining.
    #[error("Execution cancelled")]
    Cancelled,
}

impl ScriptFailure {
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// True for failures of the path to the interpreter rather than the script.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }
}

/// Outcome of one submission, produced once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub unit: UnitId,
    /// Source identifier of the unit, for diagnostics.
    pub source: String,
    pub status: ExecutionStatus,
    /// Value produced by the script, if any.
    pub value: Option<Value>,
    pub error: Option<ScriptFailure>,
    pub elapsed_ms: u64,
}

impl ExecutionResult {
    pub fn completed(unit: UnitId, source: impl Into<String>, value: Option<Value>, elapsed_ms: u64) -> Self {
        Self {
            unit,
            source: source.into(),
            status: ExecutionStatus::Completed,
            value,
            error: None,
            elapsed_ms,
        }
    }

    pub fn failed(unit: UnitId, source: impl Into<String>, error: ScriptFailure, elapsed_ms: u64) -> Self {
        Self {
            unit,
            source: source.into(),
            status: ExecutionStatus::Failed,
            value: None,
            error: Some(error),
            elapsed_ms,
        }
    }

    pub fn skipped(unit: UnitId, source: impl Into<String>) -> Self {
        Self {
            unit,
            source: source.into(),
            status: ExecutionStatus::SkippedDuplicate,
            value: None,
            error: None,
            elapsed_ms: 0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == ExecutionStatus::Failed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
