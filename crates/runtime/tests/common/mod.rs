//! Shared fixtures for runtime integration tests.

#![allow(dead_code)]

pub mod gateway;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use pvscript_core::scripting::{CompiledScript, ExecutableUnit, ScriptBindings, ScriptFailure, SubmissionContext};
use pvscript_core::value::LiveValue;
use pvscript_core::widget::MemoryWidget;
use pvscript_events::EventBus;
use pvscript_runtime::{ExecutionBackend, InProcessBackend, ScriptSupport, ScriptSupportConfig};
use serde_json::Value;

/// In-process script backed by a closure.
pub struct FnScript<F>(pub F);

impl<F> CompiledScript for FnScript<F>
where
    F: Fn(&ScriptBindings) -> Result<Option<Value>, ScriptFailure> + Send + Sync,
{
    fn exec(&self, bindings: &ScriptBindings) -> Result<Option<Value>, ScriptFailure> {
        (self.0)(bindings)
    }
}

pub fn script<F>(source: &str, inputs: &[&str], f: F) -> Arc<ExecutableUnit>
where
    F: Fn(&ScriptBindings) -> Result<Option<Value>, ScriptFailure> + Send + Sync + 'static,
{
    ExecutableUnit::in_process(
        source,
        inputs.iter().map(|s| s.to_string()).collect(),
        Arc::new(FnScript(f)),
    )
}

/// Latch that blocks scripts until the test opens it.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
    waiting: AtomicUsize,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(&self) {
        *self.open.lock().expect("gate lock") = true;
        self.cv.notify_all();
    }

    /// Block until opened. Returns `Err(Cancelled)` if the bindings get
    /// cancelled first.
    pub fn wait(&self, bindings: &ScriptBindings) -> Result<(), ScriptFailure> {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let mut open = self.open.lock().expect("gate lock");
        while !*open {
            if bindings.is_cancelled() {
                return Err(ScriptFailure::Cancelled);
            }
            open = self
                .cv
                .wait_timeout(open, Duration::from_millis(10))
                .expect("gate wait")
                .0;
        }
        Ok(())
    }

    /// Number of scripts that have reached the gate.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Spin until `n` scripts reached the gate.
    pub async fn reached(&self, n: usize) {
        for _ in 0..500 {
            if self.waiting() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("only {} of {n} scripts reached the gate", self.waiting());
    }
}

pub fn widget() -> Arc<MemoryWidget> {
    Arc::new(MemoryWidget::new("Label 100", "label").with_property("text", ""))
}

pub fn context(values: Vec<LiveValue>) -> SubmissionContext {
    SubmissionContext::explicit(widget(), values)
}

pub fn x(value: i64) -> Vec<LiveValue> {
    vec![LiveValue::new("loc://x", value)]
}

pub fn start(pool_size: usize) -> Arc<ScriptSupport> {
    start_with(
        ScriptSupportConfig::default().with_pool_size(pool_size),
        vec![Arc::new(InProcessBackend)],
    )
}

pub fn start_with(config: ScriptSupportConfig, backends: Vec<Arc<dyn ExecutionBackend>>) -> Arc<ScriptSupport> {
    ScriptSupport::start(config, backends, Arc::new(EventBus::default())).expect("inside runtime")
}
