//! Macro expansion for script paths and other widget text.
//!
//! Supports `$(NAME)` and `${NAME}`. Macros without a value are left in
//! place so the unresolved name shows up in error messages.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::CoreError;

/// Maximum number of expansion passes for macros whose values contain
/// further macros.
pub const MAX_MACRO_DEPTH: usize = 8;

static MACRO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\(([A-Za-z_][A-Za-z0-9_]*)\)|\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .expect("valid regex")
});

/// Source of macro values.
pub trait MacroProvider {
    /// Value of the macro, `None` if not defined.
    fn value(&self, name: &str) -> Option<String>;
}

impl MacroProvider for HashMap<String, String> {
    fn value(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Expand all macros in `text`.
///
/// Values may themselves contain macros; expansion repeats until the text
/// is stable. A chain deeper than [`MAX_MACRO_DEPTH`] (usually a macro that
/// refers to itself) is a validation error.
pub fn expand_macros(text: &str, provider: &dyn MacroProvider) -> Result<String, CoreError> {
    let mut current = text.to_string();
    for _ in 0..=MAX_MACRO_DEPTH {
        let next = expand_once(&current, provider);
        if next == current {
            return Ok(next);
        }
        current = next;
    }
    Err(CoreError::Validation(format!(
        "Macro expansion of '{text}' exceeds {MAX_MACRO_DEPTH} levels"
    )))
}

fn expand_once(text: &str, provider: &dyn MacroProvider) -> String {
    MACRO_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            provider
                .value(name)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
