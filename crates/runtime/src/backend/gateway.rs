use std::sync::Arc;

use async_trait::async_trait;
use pvscript_core::scripting::{
    BackendKind, ExecutableUnit, ExecutionBackend, ScriptBindings, ScriptFailure, UnitPayload,
};
use pvscript_gateway::{GatewayAdapter, InvokeRequest, ResponseStatus};
use serde_json::Value;

/// Runs script files in the external interpreter through a [`GatewayAdapter`].
///
/// Property writes the script made on its widget token come back with the
/// response and are applied to the invoking widget before the result is
/// reported, including when the script failed part way.
pub struct GatewayBackend {
    adapter: Arc<GatewayAdapter>,
}

impl GatewayBackend {
    pub fn new(adapter: Arc<GatewayAdapter>) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &Arc<GatewayAdapter> {
        &self.adapter
    }
}

#[async_trait]
impl ExecutionBackend for GatewayBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gateway
    }

    async fn run(
        &self,
        unit: Arc<ExecutableUnit>,
        bindings: ScriptBindings,
    ) -> Result<Option<Value>, ScriptFailure> {
        let UnitPayload::Gateway { script_path } = unit.payload() else {
            return Err(ScriptFailure::script(format!("{unit} is not a gateway unit")));
        };

        let request = InvokeRequest::from_bindings(script_path.display().to_string(), &bindings);
        let response = self.adapter.invoke(&request).await?;

        let widget = bindings.widget();
        for update in response.updates {
            if let Err(e) = widget.set_property(&update.property, update.value) {
                tracing::warn!(
                    unit = %unit.source(),
                    widget = %widget.name(),
                    property = %update.property,
                    error = %e,
                    "Ignoring property update from script",
                );
            }
        }

        match response.status {
            ResponseStatus::Ok => Ok(response.value),
            ResponseStatus::Error => Err(ScriptFailure::script(
                response.error.unwrap_or_else(|| "Script failed without a message".into()),
            )),
        }
    }

    async fn close(&self) {
        self.adapter.close().await;
    }
}
