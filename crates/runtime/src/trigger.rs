//! Binding of a widget's script inputs to one executable unit.
//!
//! A widget script declares its inputs; some of them trigger execution
//! when their value changes, others are only read. [`ScriptTrigger`]
//! keeps the latest value of every input and turns qualifying changes
//! into submissions.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use pvscript_core::macros::{expand_macros, MacroProvider};
use pvscript_core::scripting::{CompileError, ExecutableUnit, ScriptCompiler, SubmissionContext, Trigger};
use pvscript_core::value::LiveValue;
use pvscript_core::widget::Widget;

use crate::handle::Submission;
use crate::manager::{ScriptSupport, ScriptSupportError};

/// One declared script input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerInput {
    pub name: String,
    /// A change of this input runs the script.
    pub triggers: bool,
}

impl TriggerInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            triggers: true,
        }
    }

    /// Input that is read by the script but never runs it.
    pub fn passive(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            triggers: false,
        }
    }
}

pub struct ScriptTrigger {
    support: Arc<ScriptSupport>,
    unit: Arc<ExecutableUnit>,
    widget: Arc<dyn Widget>,
    inputs: Vec<TriggerInput>,
    check_connections: bool,
    latest: Mutex<Vec<Option<LiveValue>>>,
}

impl ScriptTrigger {
    /// Bind `inputs` of `widget` to `unit`.
    ///
    /// With `check_connections`, the script only runs once every input has
    /// a connected value. Without it, inputs that have not reported yet are
    /// passed as disconnected placeholders.
    pub fn new(
        support: Arc<ScriptSupport>,
        unit: Arc<ExecutableUnit>,
        widget: Arc<dyn Widget>,
        inputs: Vec<TriggerInput>,
        check_connections: bool,
    ) -> Result<Self, ScriptSupportError> {
        if inputs.len() != unit.inputs().len() {
            return Err(ScriptSupportError::InputCountMismatch {
                unit: unit.source().to_string(),
                expected: unit.inputs().len(),
                actual: inputs.len(),
            });
        }
        let latest = Mutex::new(vec![None; inputs.len()]);
        Ok(Self {
            support,
            unit,
            widget,
            inputs,
            check_connections,
            latest,
        })
    }

    pub fn unit(&self) -> &Arc<ExecutableUnit> {
        &self.unit
    }

    /// Record a new value for input `index` and run the script if it should.
    ///
    /// `Ok(None)` means no submission was attempted: the index is out of
    /// range, the input does not trigger, or an input is not connected.
    pub fn value_changed(&self, index: usize, value: LiveValue) -> Result<Option<Submission>, ScriptSupportError> {
        let values = {
            let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(slot) = latest.get_mut(index) else {
                tracing::warn!(unit = %self.unit.source(), index, "Value for undeclared script input");
                return Ok(None);
            };
            *slot = Some(value);

            if !self.inputs[index].triggers {
                return Ok(None);
            }
            if self.check_connections && !all_connected(&latest) {
                tracing::debug!(
                    unit = %self.unit.source(),
                    widget = %self.widget.name(),
                    "Not all script inputs connected, skipping trigger",
                );
                return Ok(None);
            }
            self.snapshot(&latest)
        };

        let context = SubmissionContext::new(Arc::clone(&self.widget), values, Trigger::Input(index));
        self.support.submit(&self.unit, context).map(Some)
    }

    /// Run the script explicitly with the latest values, e.g. for an action.
    pub fn invoke(&self) -> Result<Submission, ScriptSupportError> {
        let values = {
            let latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
            self.snapshot(&latest)
        };
        self.support
            .submit(&self.unit, SubmissionContext::explicit(Arc::clone(&self.widget), values))
    }

    fn snapshot(&self, latest: &[Option<LiveValue>]) -> Vec<LiveValue> {
        latest
            .iter()
            .zip(&self.inputs)
            .map(|(value, input)| {
                value
                    .clone()
                    .unwrap_or_else(|| LiveValue::disconnected(input.name.as_str()))
            })
            .collect()
    }
}

fn all_connected(latest: &[Option<LiveValue>]) -> bool {
    latest
        .iter()
        .all(|value| value.as_ref().is_some_and(LiveValue::is_connected))
}

/// Resolve a widget's script path and compile it.
///
/// Macros in `path_template` are expanded first; a relative result is
/// resolved against `base_dir` (the directory of the display file).
pub fn compile_binding(
    compiler: &dyn ScriptCompiler,
    base_dir: &Path,
    path_template: &str,
    macros: &dyn MacroProvider,
    inputs: &[TriggerInput],
) -> Result<Arc<ExecutableUnit>, CompileError> {
    let expanded = expand_macros(path_template, macros)?;
    let path = base_dir.join(expanded);
    let names = inputs.iter().map(|input| input.name.clone()).collect();

    compiler.compile(&path, names).inspect_err(|e| {
        tracing::warn!(script = %path.display(), error = %e, "Cannot compile widget script");
    })
}
