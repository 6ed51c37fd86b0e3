//! Script support manager.
//!
//! [`ScriptSupport`] accepts submissions from any thread, admits at most
//! one pending execution per unit, runs admitted work on a bounded pool
//! and shuts down in order. Failures of a script are reported through its
//! result and never reach the submitting thread or the pool itself.
//!
//! Lifecycle of one submission:
//!
//! ```text
//! submit -> dedup admit -> job spawned -> pool permit -> backend.run
//!        -> result built -> pending entry released -> result delivered
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use futures::FutureExt;
use pvscript_core::scripting::{
    BackendKind, ExecutableUnit, ExecutionBackend, ExecutionResult, ScriptBindings, ScriptFailure,
    SubmissionContext,
};
use pvscript_events::{EventBus, ScriptEvent, ScriptEventKind};
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::backend::panic_message;
use crate::config::ScriptSupportConfig;
use crate::dedup::{DedupQueue, PendingGuard};
use crate::handle::{ScriptHandle, Submission};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How [`ScriptSupport::shutdown`] treats outstanding work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownMode {
    /// Let outstanding work finish, bounded by the drain timeout.
    #[default]
    Drain,
    /// Ask outstanding work to stop; it completes as cancelled.
    Cancel,
}

/// What happened during shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Outstanding work did not finish within the drain timeout.
    pub timed_out: bool,
    /// Executions still tracked when shutdown returned.
    pub outstanding: usize,
    /// Shutdown had already been requested; this call did nothing.
    pub already_shut_down: bool,
}

/// Caller contract violations reported by [`ScriptSupport`].
#[derive(Debug, thiserror::Error)]
pub enum ScriptSupportError {
    /// The number of values does not match the unit's declared inputs.
    #[error("{unit} declares {expected} inputs but {actual} values were supplied")]
    InputCountMismatch {
        unit: String,
        expected: usize,
        actual: usize,
    },

    /// No backend was registered for the unit's kind.
    #[error("No {0} backend is registered")]
    BackendUnavailable(BackendKind),

    /// [`ScriptSupport::start`] was called outside a Tokio runtime.
    #[error("Script support must be started inside a Tokio runtime")]
    NoRuntime,
}

// ---------------------------------------------------------------------------
// ScriptSupport
// ---------------------------------------------------------------------------

/// Bounded-pool scheduler for executable units.
///
/// Created once via [`ScriptSupport::start`] and shared as `Arc`. All
/// methods except [`shutdown`](Self::shutdown) are synchronous and may be
/// called from threads outside the runtime.
pub struct ScriptSupport {
    config: ScriptSupportConfig,
    runtime: Handle,
    backends: HashMap<BackendKind, Arc<dyn ExecutionBackend>>,
    /// One pending set per backend.
    lanes: HashMap<BackendKind, DedupQueue>,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    /// Read-locked for the whole of `submit` so that nothing slips in
    /// between the accepting check and the spawn once shutdown flips it.
    accepting: RwLock<bool>,
    events: Arc<EventBus>,
}

impl ScriptSupport {
    /// Start a manager with the given backends, one per [`BackendKind`].
    ///
    /// Must be called from within a Tokio runtime; the runtime's handle is
    /// kept so that `submit` works from any thread.
    pub fn start(
        config: ScriptSupportConfig,
        backends: Vec<Arc<dyn ExecutionBackend>>,
        events: Arc<EventBus>,
    ) -> Result<Arc<Self>, ScriptSupportError> {
        let runtime = Handle::try_current().map_err(|_| ScriptSupportError::NoRuntime)?;

        let backends: HashMap<_, _> = backends
            .into_iter()
            .map(|backend| (backend.kind(), backend))
            .collect();
        let lanes = backends.keys().map(|kind| (*kind, DedupQueue::new())).collect();

        tracing::info!(
            pool_size = config.pool_size,
            backends = ?backends.keys().map(|k| k.as_str()).collect::<Vec<_>>(),
            "Script support started",
        );

        Ok(Arc::new(Self {
            permits: Arc::new(Semaphore::new(config.pool_size)),
            config,
            runtime,
            backends,
            lanes,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
            accepting: RwLock::new(true),
            events,
        }))
    }

    pub fn config(&self) -> &ScriptSupportConfig {
        &self.config
    }

    /// Request execution of `unit`.
    ///
    /// Never blocks on script execution. Returns
    /// [`Submission::Skipped`] when the unit is already pending and
    /// [`Submission::Rejected`] once shutdown has begun.
    pub fn submit(
        &self,
        unit: &Arc<ExecutableUnit>,
        context: SubmissionContext,
    ) -> Result<Submission, ScriptSupportError> {
        let accepting = self.accepting.read().unwrap_or_else(PoisonError::into_inner);

        if !*accepting {
            tracing::debug!(unit = %unit.source(), "Script submitted after shutdown, rejecting");
            self.events.publish(
                ScriptEvent::new(ScriptEventKind::Rejected)
                    .with_unit(unit.id(), unit.source())
                    .with_widget(context.widget.name()),
            );
            return Ok(Submission::Rejected);
        }

        if context.values.len() != unit.inputs().len() {
            return Err(ScriptSupportError::InputCountMismatch {
                unit: unit.source().to_string(),
                expected: unit.inputs().len(),
                actual: context.values.len(),
            });
        }

        let kind = unit.kind();
        let (Some(backend), Some(lane)) = (self.backends.get(&kind), self.lanes.get(&kind)) else {
            return Err(ScriptSupportError::BackendUnavailable(kind));
        };

        let Some(guard) = lane.try_admit(unit.id()) else {
            tracing::debug!(
                unit = %unit.source(),
                widget = %context.widget.name(),
                "Script still pending, skipping trigger",
            );
            self.events.publish(
                ScriptEvent::new(ScriptEventKind::Skipped)
                    .with_unit(unit.id(), unit.source())
                    .with_widget(context.widget.name()),
            );
            return Ok(Submission::Skipped(ExecutionResult::skipped(unit.id(), unit.source())));
        };

        self.events.publish(
            ScriptEvent::new(ScriptEventKind::Scheduled)
                .with_unit(unit.id(), unit.source())
                .with_widget(context.widget.name()),
        );

        let (tx, rx) = oneshot::channel();
        let job = Job {
            unit: Arc::clone(unit),
            context,
            backend: Arc::clone(backend),
            permits: Arc::clone(&self.permits),
            cancel: self.cancel.clone(),
            events: Arc::clone(&self.events),
            guard,
            tx,
        };
        self.tracker.spawn_on(job.run(), &self.runtime);

        Ok(Submission::Scheduled(ScriptHandle::new(unit.id(), unit.source(), rx)))
    }

    /// Stop accepting work and wind down.
    ///
    /// Only the first call does anything; later calls report
    /// `already_shut_down`. Waits at most the configured drain timeout for
    /// outstanding work, then closes every backend.
    pub async fn shutdown(&self, mode: ShutdownMode) -> ShutdownReport {
        {
            let mut accepting = self.accepting.write().unwrap_or_else(PoisonError::into_inner);
            if !*accepting {
                return ShutdownReport {
                    timed_out: false,
                    outstanding: self.tracker.len(),
                    already_shut_down: true,
                };
            }
            *accepting = false;
        }

        tracing::info!(?mode, outstanding = self.tracker.len(), "Shutting down script support");

        self.tracker.close();
        if mode == ShutdownMode::Cancel {
            self.cancel.cancel();
        }

        let timed_out = tokio::time::timeout(self.config.drain_timeout, self.tracker.wait())
            .await
            .is_err();
        if timed_out {
            tracing::warn!(
                outstanding = self.tracker.len(),
                timeout_ms = self.config.drain_timeout.as_millis() as u64,
                "Outstanding scripts did not finish in time, cancelling",
            );
            self.cancel.cancel();
        }

        for backend in self.backends.values() {
            backend.close().await;
        }

        let outstanding = self.tracker.len();
        tracing::info!(timed_out, outstanding, "Script support shut down complete");

        ShutdownReport {
            timed_out,
            outstanding,
            already_shut_down: false,
        }
    }

    /// Executions submitted but not yet finished.
    pub fn outstanding(&self) -> usize {
        self.tracker.len()
    }

    /// True while `unit` has an execution pending.
    pub fn is_pending(&self, unit: &ExecutableUnit) -> bool {
        self.lanes
            .get(&unit.kind())
            .is_some_and(|lane| lane.contains(unit.id()))
    }

    pub fn is_accepting(&self) -> bool {
        *self.accepting.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScriptEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }
}

impl fmt::Debug for ScriptSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptSupport")
            .field("pool_size", &self.config.pool_size)
            .field("backends", &self.backends.keys().collect::<Vec<_>>())
            .field("outstanding", &self.tracker.len())
            .field("accepting", &self.is_accepting())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// One admitted execution, owned by its pool task.
struct Job {
    unit: Arc<ExecutableUnit>,
    context: SubmissionContext,
    backend: Arc<dyn ExecutionBackend>,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
    events: Arc<EventBus>,
    guard: PendingGuard,
    tx: oneshot::Sender<ExecutionResult>,
}

impl Job {
    async fn run(self) {
        let Job {
            unit,
            context,
            backend,
            permits,
            cancel,
            events,
            guard,
            tx,
        } = self;

        let start = Instant::now();
        let widget = context.widget.name().to_string();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ScriptFailure::Cancelled),
            outcome = execute(&unit, context, backend.as_ref(), &permits, &cancel) => outcome,
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(value) => {
                tracing::debug!(unit = %unit.source(), widget = %widget, elapsed_ms, "Script completed");
                events.publish(
                    ScriptEvent::new(ScriptEventKind::Completed)
                        .with_unit(unit.id(), unit.source())
                        .with_widget(&widget),
                );
                ExecutionResult::completed(unit.id(), unit.source(), value, elapsed_ms)
            }
            Err(failure) => {
                match &failure {
                    f if f.is_transport() => tracing::error!(
                        unit = %unit.source(),
                        widget = %widget,
                        error = %f,
                        "Script gateway failure",
                    ),
                    ScriptFailure::Cancelled => tracing::info!(
                        unit = %unit.source(),
                        widget = %widget,
                        "Script cancelled",
                    ),
                    f => tracing::warn!(
                        unit = %unit.source(),
                        widget = %widget,
                        error = %f,
                        "Script failed",
                    ),
                }
                events.publish(
                    ScriptEvent::new(ScriptEventKind::Failed)
                        .with_unit(unit.id(), unit.source())
                        .with_widget(&widget)
                        .with_error(failure.to_string(), failure.is_transport()),
                );
                ExecutionResult::failed(unit.id(), unit.source(), failure, elapsed_ms)
            }
        };

        // Released before delivery so that whoever reacts to the result can
        // submit the unit again.
        drop(guard);
        let _ = tx.send(result);
    }
}

/// Wait for a pool slot, then run the backend. Panics become failures.
async fn execute(
    unit: &Arc<ExecutableUnit>,
    context: SubmissionContext,
    backend: &dyn ExecutionBackend,
    permits: &Arc<Semaphore>,
    cancel: &CancellationToken,
) -> Result<Option<Value>, ScriptFailure> {
    let _permit = Arc::clone(permits)
        .acquire_owned()
        .await
        .map_err(|_| ScriptFailure::Cancelled)?;

    let bindings = ScriptBindings::bind(unit, context, cancel.clone());
    std::panic::AssertUnwindSafe(backend.run(Arc::clone(unit), bindings))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| {
            Err(ScriptFailure::Panicked {
                message: panic_message(payload),
            })
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pvscript_core::scripting::CompiledScript;
    use pvscript_core::value::LiveValue;
    use pvscript_core::widget::MemoryWidget;

    use super::*;
    use crate::backend::InProcessBackend;

    struct Echo;

    impl CompiledScript for Echo {
        fn exec(&self, bindings: &ScriptBindings) -> Result<Option<Value>, ScriptFailure> {
            Ok(bindings.inputs().first().map(|(_, v)| v.value.clone()))
        }
    }

    fn support() -> Arc<ScriptSupport> {
        ScriptSupport::start(
            ScriptSupportConfig::default().with_pool_size(2),
            vec![Arc::new(InProcessBackend)],
            Arc::new(EventBus::default()),
        )
        .expect("inside runtime")
    }

    fn context(values: Vec<LiveValue>) -> SubmissionContext {
        SubmissionContext::explicit(Arc::new(MemoryWidget::new("Label", "label")), values)
    }

    #[test]
    fn start_outside_runtime_fails() {
        let result = ScriptSupport::start(
            ScriptSupportConfig::default(),
            vec![Arc::new(InProcessBackend)],
            Arc::new(EventBus::default()),
        );
        assert_matches!(result, Err(ScriptSupportError::NoRuntime));
    }

    #[tokio::test]
    async fn debug_output_names_pool_and_backends() {
        let support = support();
        let text = format!("{support:?}");
        assert!(text.contains("pool_size"));
        assert!(text.contains("InProcess"));
        assert!(text.contains("accepting: true"));
    }

    #[tokio::test]
    async fn submit_and_wait() {
        let support = support();
        let unit = ExecutableUnit::in_process("echo", vec!["x".into()], Arc::new(Echo));

        let handle = support
            .submit(&unit, context(vec![LiveValue::new("x", 7)]))
            .expect("submit")
            .into_handle()
            .expect("scheduled");
        let result = handle.wait().await;

        assert!(result.is_completed());
        assert_eq!(result.value, Some(serde_json::json!(7)));
        assert_eq!(result.unit, unit.id());
        assert!(!support.is_pending(&unit));
    }

    #[tokio::test]
    async fn input_count_mismatch_is_rejected_before_admission() {
        let support = support();
        let unit = ExecutableUnit::in_process("echo", vec!["x".into(), "y".into()], Arc::new(Echo));

        let err = support
            .submit(&unit, context(vec![LiveValue::new("x", 1)]))
            .expect_err("mismatch");

        assert_matches!(err, ScriptSupportError::InputCountMismatch { expected: 2, actual: 1, .. });
        assert!(!support.is_pending(&unit));
        assert_eq!(support.outstanding(), 0);
    }

    #[tokio::test]
    async fn missing_backend_is_reported() {
        let support = support();
        let unit = ExecutableUnit::gateway("/tmp/a.py", vec![]);

        assert_matches!(
            support.submit(&unit, context(vec![])),
            Err(ScriptSupportError::BackendUnavailable(BackendKind::Gateway))
        );
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let support = support();

        let first = support.shutdown(ShutdownMode::Drain).await;
        assert!(!first.already_shut_down);
        assert!(!first.timed_out);
        assert!(!support.is_accepting());

        let second = support.shutdown(ShutdownMode::Cancel).await;
        assert!(second.already_shut_down);
    }
}
