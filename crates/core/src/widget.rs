//! Widget handle contract.
//!
//! The widget model is owned by the display runtime. Scripts only see a
//! read/write handle to widget properties, which is what [`Widget`]
//! describes. [`MemoryWidget`] is a plain in-memory implementation used by
//! the runner binary and by tests.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::CoreError;

/// Read/write handle to one widget's state.
pub trait Widget: Send + Sync + fmt::Debug {
    /// Widget name as shown to operators, used in log messages.
    fn name(&self) -> &str;

    /// Widget type, e.g. `"label"` or `"textupdate"`.
    fn widget_type(&self) -> &str;

    /// Current value of a property, `None` if the widget has no such property.
    fn property(&self, name: &str) -> Option<Value>;

    /// Update a property.
    fn set_property(&self, name: &str, value: Value) -> Result<(), CoreError>;
}

/// Opaque token standing in for a widget across a process boundary.
///
/// A fresh token is minted for every gateway call and is meaningless
/// once that call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WidgetToken(Uuid);

impl WidgetToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WidgetToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WidgetToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Widget whose properties live in a map.
///
/// Only properties present at construction may be written, mirroring a
/// real widget whose property set is fixed by its type.
#[derive(Debug)]
pub struct MemoryWidget {
    name: String,
    widget_type: String,
    properties: Mutex<HashMap<String, Value>>,
}

impl MemoryWidget {
    pub fn new(name: impl Into<String>, widget_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            widget_type: widget_type.into(),
            properties: Mutex::new(HashMap::new()),
        }
    }

    /// Declare a property with its initial value.
    pub fn with_property(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.lock().insert(name.into(), value.into());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        // A panicking writer cannot leave a half-written map behind.
        self.properties
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Widget for MemoryWidget {
    fn name(&self) -> &str {
        &self.name
    }

    fn widget_type(&self) -> &str {
        &self.widget_type
    }

    fn property(&self, name: &str) -> Option<Value> {
        self.lock().get(name).cloned()
    }

    fn set_property(&self, name: &str, value: Value) -> Result<(), CoreError> {
        match self.lock().get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(CoreError::UnknownProperty {
                widget: self.name.clone(),
                property: name.to_string(),
            }),
        }
    }
}
