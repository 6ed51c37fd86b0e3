//! Interpreter preferences loaded in the background.
//!
//! [`PreferenceService`] reads [`ScriptPreferences`] from a JSON source on
//! a blocking worker. Readers wait a bounded time for a load in progress
//! and fall back to defaults instead of blocking the caller indefinitely.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Default bound on how long [`PreferenceService::get`] waits for a load.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for the script interpreters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptPreferences {
    /// Extra module search path entries for the external interpreter.
    pub python_path: Vec<String>,
    /// Upper bound for reading the preferences, in milliseconds.
    pub read_timeout_ms: u64,
}

impl Default for ScriptPreferences {
    fn default() -> Self {
        Self {
            python_path: Vec::new(),
            read_timeout_ms: DEFAULT_READ_TIMEOUT.as_millis() as u64,
        }
    }
}

impl ScriptPreferences {
    /// `python_path` joined the way `PYTHONPATH` expects, `None` if empty.
    pub fn python_path_env(&self) -> Option<String> {
        if self.python_path.is_empty() {
            return None;
        }
        let sep = if cfg!(windows) { ";" } else { ":" };
        Some(self.python_path.join(sep))
    }
}

type Slot = watch::Receiver<Option<Arc<ScriptPreferences>>>;

/// Background loader with bounded-wait reads.
pub struct PreferenceService {
    current: Mutex<Slot>,
    wait: Duration,
}

impl PreferenceService {
    /// Service that starts out holding the defaults.
    pub fn new(wait: Duration) -> Self {
        let (_tx, rx) = watch::channel(Some(Arc::new(ScriptPreferences::default())));
        Self {
            current: Mutex::new(rx),
            wait,
        }
    }

    /// Start loading preferences from `source` in the background.
    ///
    /// `source` runs on a blocking worker, so slow operations (opening a
    /// file, fetching a URL) belong inside it. A source that fails or
    /// yields malformed JSON leaves the defaults in place. Must be called
    /// from within a Tokio runtime.
    pub fn load<F>(&self, name: impl Into<String>, source: F)
    where
        F: FnOnce() -> std::io::Result<Vec<u8>> + Send + 'static,
    {
        let name = name.into();
        let (tx, rx) = watch::channel(None);
        *self.lock() = rx;

        tokio::task::spawn_blocking(move || {
            let prefs = match source() {
                Ok(bytes) => match serde_json::from_slice::<ScriptPreferences>(&bytes) {
                    Ok(prefs) => {
                        tracing::info!(source = %name, "Loaded script preferences");
                        prefs
                    }
                    Err(e) => {
                        tracing::warn!(source = %name, error = %e, "Malformed script preferences");
                        ScriptPreferences::default()
                    }
                },
                Err(e) => {
                    tracing::warn!(source = %name, error = %e, "Cannot read script preferences");
                    ScriptPreferences::default()
                }
            };
            let _ = tx.send(Some(Arc::new(prefs)));
        });
    }

    /// Start loading preferences from a JSON file.
    pub fn load_file(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let name = path.display().to_string();
        self.load(name, move || std::fs::read(path));
    }

    /// Current preferences.
    ///
    /// Waits for a load in progress up to the configured bound, then logs
    /// a warning and returns the defaults.
    pub async fn get(&self) -> Arc<ScriptPreferences> {
        let mut rx = self.lock().clone();
        let prefs = match tokio::time::timeout(self.wait, rx.wait_for(Option::is_some)).await {
            Ok(Ok(loaded)) => loaded
                .as_ref()
                .map(Arc::clone)
                .unwrap_or_else(|| Arc::new(ScriptPreferences::default())),
            Ok(Err(_)) => {
                tracing::warn!("Preference loader went away, using defaults");
                Arc::new(ScriptPreferences::default())
            }
            Err(_) => {
                tracing::warn!(
                    wait_ms = self.wait.as_millis() as u64,
                    "Using default script preferences because they are still loading",
                );
                Arc::new(ScriptPreferences::default())
            }
        };
        prefs
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for PreferenceService {
    fn default() -> Self {
        Self::new(DEFAULT_READ_TIMEOUT)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
