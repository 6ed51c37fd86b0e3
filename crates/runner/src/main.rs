//! `pvscript-runner` -- run one widget script from the command line.
//!
//! Compiles the script at the given path, binds the `NAME=VALUE` inputs
//! to an in-memory widget, runs it once through the external interpreter
//! gateway and prints the result and the widget's properties as JSON.
//!
//! ```text
//! pvscript-runner -m M=motor1 -p text="" scripts/$(M).py pv0=3 pv1=on
//! ```
//!
//! # Environment variables
//!
//! | Variable                  | Required | Default                 | Description                                   |
//! |---------------------------|----------|-------------------------|-----------------------------------------------|
//! | `GATEWAY_WS_URL`          | no       | `ws://127.0.0.1:25333`  | Interpreter gateway endpoint                  |
//! | `GATEWAY_COMMAND`         | no       | --                      | Command that starts the gateway process       |
//! | `GATEWAY_CALL_TIMEOUT_MS` | no       | `10000`                 | Bound on one script call                      |
//! | `SCRIPT_POOL_SIZE`        | no       | CPU count               | Concurrent script executions                  |
//! | `SCRIPT_PREFERENCES`      | no       | --                      | JSON file with interpreter preferences        |
//! | `RUST_LOG`                | no       | `pvscript_runner=info`  | Log filter                                    |

mod args;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use pvscript_core::preferences::{PreferenceService, DEFAULT_READ_TIMEOUT};
use pvscript_core::scripting::ExecutionResult;
use pvscript_core::value::LiveValue;
use pvscript_core::widget::{MemoryWidget, Widget};
use pvscript_events::EventBus;
use pvscript_gateway::{GatewayAdapter, GatewayConfig};
use pvscript_runtime::{
    compile_binding, GatewayBackend, GatewayCompiler, InProcessBackend, ScriptSupport,
    ScriptSupportConfig, ScriptTrigger, ShutdownMode, TriggerInput,
};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::args::RunArgs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pvscript_runner=info,pvscript_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = RunArgs::parse();

    let preferences = PreferenceService::new(DEFAULT_READ_TIMEOUT);
    if let Ok(path) = std::env::var("SCRIPT_PREFERENCES") {
        preferences.load_file(path);
    }
    let preferences = preferences.get().await;

    let gateway_config = GatewayConfig::from_env().with_python_path(preferences.python_path_env());
    tracing::info!(
        ws_url = %gateway_config.ws_url,
        launches = gateway_config.command.is_some(),
        "Starting pvscript-runner",
    );

    let events = Arc::new(EventBus::default());
    let adapter = Arc::new(GatewayAdapter::new(gateway_config, Some(Arc::clone(&events))));
    let support = ScriptSupport::start(
        ScriptSupportConfig::from_env(),
        vec![Arc::new(InProcessBackend::new()), Arc::new(GatewayBackend::new(adapter))],
        events,
    )?;

    let result = run(&support, &args).await?;
    if let Some(error) = result.error {
        anyhow::bail!("script failed: {error}");
    }
    Ok(())
}

/// Run the script once, then shut `support` down whatever the outcome.
async fn run(support: &Arc<ScriptSupport>, args: &RunArgs) -> anyhow::Result<ExecutionResult> {
    let outcome = run_once(support, args).await;
    let report = support.shutdown(ShutdownMode::Drain).await;
    tracing::debug!(?report, "Shut down");
    outcome
}

/// Compile, bind and run the script once, printing the outcome.
async fn run_once(support: &Arc<ScriptSupport>, args: &RunArgs) -> anyhow::Result<ExecutionResult> {
    let inputs: Vec<_> = args
        .inputs
        .iter()
        .map(|(name, _)| TriggerInput::passive(name.as_str()))
        .collect();
    let base_dir = std::env::current_dir().context("cannot determine working directory")?;
    let script = args.script.to_string_lossy();
    let unit = compile_binding(&GatewayCompiler::new(), &base_dir, &script, &args.macro_map(), &inputs)
        .with_context(|| format!("cannot compile {script}"))?;

    let widget = Arc::new(
        args.properties
            .iter()
            .fold(MemoryWidget::new("runner", "label"), |w, (name, value)| {
                w.with_property(name.as_str(), value.clone())
            }),
    );
    let trigger = ScriptTrigger::new(
        Arc::clone(support),
        unit,
        Arc::clone(&widget) as Arc<dyn Widget>,
        inputs,
        false,
    )?;
    for (index, (name, value)) in args.inputs.iter().enumerate() {
        trigger.value_changed(index, LiveValue::new(name.as_str(), value.clone()))?;
    }

    let Some(handle) = trigger.invoke()?.into_handle() else {
        anyhow::bail!("script was not scheduled");
    };
    let result = handle.wait().await;

    let properties: serde_json::Map<_, _> = args
        .properties
        .iter()
        .map(|(name, _)| (name.clone(), widget.property(name).unwrap_or_default()))
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "result": result, "widget": properties }))?
    );
    Ok(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
