//! Execution backend contract.
//!
//! Defines [`ExecutionBackend`], the capability every script runtime
//! implements. The manager owns one backend per [`BackendKind`] and never
//! looks past this trait.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::context::ScriptBindings;
use super::result::ScriptFailure;
use super::unit::{BackendKind, ExecutableUnit};

/// Runs executable units.
///
/// `run` executes entirely within one pool worker's slot and must not fan
/// out into unbounded extra concurrency. Errors and panics are the caller's
/// to convert into a failed result; a backend never needs to catch them.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Units of this kind are routed to this backend.
    fn kind(&self) -> BackendKind;

    /// Execute `unit` with the given bindings.
    async fn run(
        &self,
        unit: Arc<ExecutableUnit>,
        bindings: ScriptBindings,
    ) -> Result<Option<Value>, ScriptFailure>;

    /// Release resources held by the backend. Called once at manager teardown.
    async fn close(&self) {}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
