//! Script support runtime.
//!
//! [`ScriptSupport`] schedules executable units on a bounded pool,
//! skips re-triggers of a unit that is still pending, dispatches to the
//! in-process or gateway backend and shuts down in order.
//! [`ScriptTrigger`] binds a widget's inputs to one unit.

pub mod backend;
pub mod compiler;
pub mod config;
pub mod dedup;
pub mod handle;
pub mod manager;
pub mod trigger;

pub use backend::{ExecutionBackend, GatewayBackend, InProcessBackend};
pub use compiler::GatewayCompiler;
pub use config::ScriptSupportConfig;
pub use dedup::{DedupQueue, PendingGuard};
pub use handle::{ScriptHandle, Submission};
pub use manager::{ScriptSupport, ScriptSupportError, ShutdownMode, ShutdownReport};
pub use trigger::{compile_binding, ScriptTrigger, TriggerInput};
