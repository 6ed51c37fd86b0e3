//! Per-trigger submission context and the bindings a backend sees.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::unit::ExecutableUnit;
use crate::value::LiveValue;
use crate::widget::Widget;

/// What requested an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// The declared input at this index changed.
    Input(usize),
    /// Explicit invocation, e.g. a user action.
    Explicit,
}

/// Everything known about one trigger event.
///
/// Built fresh for every trigger and dropped after the single execution it
/// requested. `values` must line up 1:1 with the unit's declared inputs.
#[derive(Clone)]
pub struct SubmissionContext {
    pub widget: Arc<dyn Widget>,
    pub values: Vec<LiveValue>,
    pub trigger: Trigger,
}

impl SubmissionContext {
    pub fn new(widget: Arc<dyn Widget>, values: Vec<LiveValue>, trigger: Trigger) -> Self {
        Self {
            widget,
            values,
            trigger,
        }
    }

    /// Context for an explicit invocation.
    pub fn explicit(widget: Arc<dyn Widget>, values: Vec<LiveValue>) -> Self {
        Self::new(widget, values, Trigger::Explicit)
    }
}

impl fmt::Debug for SubmissionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionContext")
            .field("widget", &self.widget.name())
            .field("values", &self.values)
            .field("trigger", &self.trigger)
            .finish()
    }
}

/// Variables bound for one execution: the invoking widget and each declared
/// input name paired with its live value.
pub struct ScriptBindings {
    widget: Arc<dyn Widget>,
    inputs: Vec<(String, LiveValue)>,
    trigger: Trigger,
    cancel: CancellationToken,
}

impl ScriptBindings {
    /// Pair the unit's declared inputs with the context's values.
    ///
    /// Callers validate the lengths beforehand; surplus entries on either
    /// side are ignored.
    pub fn bind(unit: &ExecutableUnit, context: SubmissionContext, cancel: CancellationToken) -> Self {
        let inputs = unit
            .inputs()
            .iter()
            .cloned()
            .zip(context.values)
            .collect();
        Self {
            widget: context.widget,
            inputs,
            trigger: context.trigger,
            cancel,
        }
    }

    pub fn widget(&self) -> &Arc<dyn Widget> {
        &self.widget
    }

    pub fn trigger(&self) -> Trigger {
        self.trigger
    }

    /// Declared name of the input that fired, `None` for explicit runs.
    pub fn trigger_name(&self) -> Option<&str> {
        match self.trigger {
            Trigger::Input(index) => self.inputs.get(index).map(|(name, _)| name.as_str()),
            Trigger::Explicit => None,
        }
    }

    /// Live value bound to a declared input name.
    pub fn get(&self, name: &str) -> Option<&LiveValue> {
        self.inputs
            .iter()
            .find(|(declared, _)| declared == name)
            .map(|(_, value)| value)
    }

    /// Inputs in declared order.
    pub fn inputs(&self) -> &[(String, LiveValue)] {
        &self.inputs
    }

    /// True once the manager asked in-flight work to stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl fmt::Debug for ScriptBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptBindings")
            .field("widget", &self.widget.name())
            .field("inputs", &self.inputs)
            .field("trigger", &self.trigger)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::scripting::result::ScriptFailure;
    use crate::scripting::test_helpers::bindings;
    use crate::scripting::unit::CompiledScript;

    struct Noop;

    impl CompiledScript for Noop {
        fn exec(&self, _bindings: &ScriptBindings) -> Result<Option<Value>, ScriptFailure> {
            Ok(None)
        }
    }

    #[test]
    fn inputs_pair_with_declared_names() {
        let unit = ExecutableUnit::in_process(
            "calc.py",
            vec!["a".into(), "b".into()],
            Arc::new(Noop),
        );
        let b = bindings(
            &unit,
            vec![LiveValue::new("pv:a", 1), LiveValue::new("pv:b", 2)],
        );

        assert_eq!(b.get("b").and_then(LiveValue::as_i64), Some(2));
        assert_eq!(b.get("pv:a"), None);
        assert_eq!(b.trigger_name(), Some("a"));
        assert_eq!(b.widget().name(), "Label 100");
        assert!(!b.is_cancelled());
    }

    #[test]
    fn explicit_trigger_has_no_name() {
        let unit = ExecutableUnit::in_process("act.py", vec![], Arc::new(Noop));
        let widget = Arc::new(crate::widget::MemoryWidget::new("Button", "action_button"));
        let ctx = SubmissionContext::explicit(widget, vec![]);
        let b = ScriptBindings::bind(&unit, ctx, CancellationToken::new());
        assert_eq!(b.trigger(), Trigger::Explicit);
        assert_eq!(b.trigger_name(), None);
    }

    #[test]
    fn cancellation_is_visible() {
        let unit = ExecutableUnit::in_process("x", vec![], Arc::new(Noop));
        let token = CancellationToken::new();
        let widget = Arc::new(crate::widget::MemoryWidget::new("w", "label"));
        let b = ScriptBindings::bind(&unit, SubmissionContext::explicit(widget, vec![]), token.clone());
        token.cancel();
        assert!(b.is_cancelled());
    }
}
