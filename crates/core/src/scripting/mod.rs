//! Script units, submission contexts, results and the backend contract.
//!
//! A script goes through three stages here:
//!
//! 1. A [`ScriptCompiler`](unit::ScriptCompiler) turns a source path into an
//!    [`ExecutableUnit`](unit::ExecutableUnit), once per distinct source.
//! 2. Each trigger builds a [`SubmissionContext`](context::SubmissionContext)
//!    that the manager turns into [`ScriptBindings`](context::ScriptBindings).
//! 3. An [`ExecutionBackend`](executor::ExecutionBackend) runs the unit and
//!    the manager reports an [`ExecutionResult`](result::ExecutionResult).

pub mod context;
pub mod executor;
pub mod result;
pub mod unit;

pub use context::{ScriptBindings, SubmissionContext, Trigger};
pub use executor::ExecutionBackend;
pub use result::{ExecutionResult, ExecutionStatus, ScriptFailure};
pub use unit::{BackendKind, CompileError, CompiledScript, ExecutableUnit, ScriptCompiler, UnitPayload};
