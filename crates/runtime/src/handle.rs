//! Submission outcomes and result handles.

use std::time::Duration;

use pvscript_core::scripting::{ExecutionResult, ScriptFailure};
use pvscript_core::types::UnitId;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

/// What [`ScriptSupport::submit`](crate::ScriptSupport::submit) did.
#[derive(Debug)]
pub enum Submission {
    /// Admitted; the result arrives through the handle.
    Scheduled(ScriptHandle),
    /// The unit was already pending. Nothing was scheduled; the result
    /// has status `SkippedDuplicate`.
    Skipped(ExecutionResult),
    /// Shutdown has begun. Nothing was scheduled.
    Rejected,
}

impl Submission {
    pub fn is_scheduled(&self) -> bool {
        matches!(self, Self::Scheduled(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected)
    }

    pub fn into_handle(self) -> Option<ScriptHandle> {
        match self {
            Self::Scheduled(handle) => Some(handle),
            Self::Skipped(_) | Self::Rejected => None,
        }
    }
}

/// Receives the single result of one scheduled execution.
///
/// Dropping the handle does not cancel the execution.
#[derive(Debug)]
pub struct ScriptHandle {
    unit: UnitId,
    source: String,
    rx: oneshot::Receiver<ExecutionResult>,
}

impl ScriptHandle {
    pub(crate) fn new(unit: UnitId, source: impl Into<String>, rx: oneshot::Receiver<ExecutionResult>) -> Self {
        Self {
            unit,
            source: source.into(),
            rx,
        }
    }

    pub fn unit(&self) -> UnitId {
        self.unit
    }

    /// Wait for the result.
    pub async fn wait(self) -> ExecutionResult {
        let ScriptHandle { unit, source, rx } = self;
        rx.await
            .unwrap_or_else(|_| ExecutionResult::failed(unit, source, ScriptFailure::Cancelled, 0))
    }

    /// Wait at most `timeout`; `None` if the execution is still running.
    pub async fn wait_timeout(&mut self, timeout: Duration) -> Option<ExecutionResult> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(result)) => Some(result),
            Ok(Err(_)) => Some(self.abandoned()),
            Err(_) => None,
        }
    }

    /// Wait from a thread outside the async runtime.
    ///
    /// Panics when called from within an async context, like
    /// [`oneshot::Receiver::blocking_recv`].
    pub fn blocking_wait(self) -> ExecutionResult {
        let ScriptHandle { unit, source, rx } = self;
        rx.blocking_recv()
            .unwrap_or_else(|_| ExecutionResult::failed(unit, source, ScriptFailure::Cancelled, 0))
    }

    /// The result if it is already available.
    pub fn try_result(&mut self) -> Option<ExecutionResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(self.abandoned()),
        }
    }

    /// The job went away without reporting, e.g. torn down with the runtime.
    fn abandoned(&self) -> ExecutionResult {
        ExecutionResult::failed(self.unit, self.source.clone(), ScriptFailure::Cancelled, 0)
    }
}
