use std::sync::Arc;

use async_trait::async_trait;
use pvscript_core::scripting::{
    BackendKind, ExecutableUnit, ExecutionBackend, ScriptBindings, ScriptFailure, UnitPayload,
};
use serde_json::Value;

use super::panic_message;

/// Runs embedded interpreter payloads.
///
/// The payload runs on a blocking worker thread while the calling job
/// holds its pool permit, so at most `pool_size` payloads run at once.
#[derive(Debug, Default)]
pub struct InProcessBackend;

impl InProcessBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExecutionBackend for InProcessBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::InProcess
    }

    async fn run(
        &self,
        unit: Arc<ExecutableUnit>,
        bindings: ScriptBindings,
    ) -> Result<Option<Value>, ScriptFailure> {
        let UnitPayload::InProcess(script) = unit.payload() else {
            return Err(ScriptFailure::script(format!("{unit} is not an in-process unit")));
        };
        let script = Arc::clone(script);

        match tokio::task::spawn_blocking(move || script.exec(&bindings)).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => Err(ScriptFailure::Panicked {
                message: panic_message(e.into_panic()),
            }),
            Err(_) => Err(ScriptFailure::Cancelled),
        }
    }
}
