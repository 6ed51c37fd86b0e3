//! Execution backends.
//!
//! - [`InProcessBackend`]: embedded interpreter payloads on blocking workers.
//! - [`GatewayBackend`]: script files run by the external interpreter.

mod gateway;
mod in_process;

pub use gateway::GatewayBackend;
pub use in_process::InProcessBackend;
pub use pvscript_core::scripting::ExecutionBackend;

/// Human-readable text from a panic payload.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
