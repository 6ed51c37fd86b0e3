//! Executable units and the compiler contract.
//!
//! An [`ExecutableUnit`] is created once per distinct script source and
//! then shared as `Arc<ExecutableUnit>` by every trigger that runs it.
//! Identity is the [`UnitId`] allocated at construction, never the content.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::context::ScriptBindings;
use super::result::ScriptFailure;
use crate::error::CoreError;
use crate::types::UnitId;

/// Program compiled by an embedded interpreter.
///
/// Runs synchronously on the calling worker thread. Long-running scripts
/// should poll [`ScriptBindings::is_cancelled`] at safe points and return
/// [`ScriptFailure::Cancelled`] when it turns true.
pub trait CompiledScript: Send + Sync {
    fn exec(&self, bindings: &ScriptBindings) -> Result<Option<Value>, ScriptFailure>;
}

/// Which execution backend runs a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Embedded interpreter, runs on a pool worker thread.
    InProcess,
    /// External interpreter process reached through the gateway.
    Gateway,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProcess => "in_process",
            Self::Gateway => "gateway",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend-specific compiled payload.
#[derive(Clone)]
pub enum UnitPayload {
    InProcess(Arc<dyn CompiledScript>),
    Gateway {
        /// Resolved path handed to the external interpreter.
        script_path: PathBuf,
    },
}

impl UnitPayload {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::InProcess(_) => BackendKind::InProcess,
            Self::Gateway { .. } => BackendKind::Gateway,
        }
    }
}

impl fmt::Debug for UnitPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProcess(_) => f.write_str("InProcess(..)"),
            Self::Gateway { script_path } => f
                .debug_struct("Gateway")
                .field("script_path", script_path)
                .finish(),
        }
    }
}

/// A compiled, reusable script bound to its declared inputs.
#[derive(Debug)]
pub struct ExecutableUnit {
    id: UnitId,
    source: String,
    inputs: Vec<String>,
    payload: UnitPayload,
}

impl ExecutableUnit {
    pub fn new(source: impl Into<String>, inputs: Vec<String>, payload: UnitPayload) -> Arc<Self> {
        Arc::new(Self {
            id: UnitId::next(),
            source: source.into(),
            inputs,
            payload,
        })
    }

    /// Unit run by the embedded interpreter.
    pub fn in_process(
        source: impl Into<String>,
        inputs: Vec<String>,
        script: Arc<dyn CompiledScript>,
    ) -> Arc<Self> {
        Self::new(source, inputs, UnitPayload::InProcess(script))
    }

    /// Unit run by the external interpreter; `source` is the script path.
    pub fn gateway(script_path: impl Into<PathBuf>, inputs: Vec<String>) -> Arc<Self> {
        let script_path = script_path.into();
        let source = script_path.display().to_string();
        Self::new(source, inputs, UnitPayload::Gateway { script_path })
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    /// Source identifier (path or name) for diagnostics.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Declared input names, in binding order.
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn payload(&self) -> &UnitPayload {
        &self.payload
    }

    pub fn kind(&self) -> BackendKind {
        self.payload.kind()
    }
}

impl fmt::Display for ExecutableUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.source, self.id)
    }
}

/// Errors reported synchronously by a [`ScriptCompiler`].
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// The script file does not exist.
    #[error("Script file {0} does not exist")]
    NotFound(PathBuf),

    /// The path exists but is not a regular file.
    #[error("Script path {0} is not a file")]
    NotAFile(PathBuf),

    /// The interpreter rejected the source.
    #[error("Cannot compile {source_name}: {message}")]
    Syntax { source_name: String, message: String },

    /// Macro expansion of the script path failed.
    #[error("Cannot resolve script path: {0}")]
    Macro(#[from] CoreError),

    #[error("I/O error reading script: {0}")]
    Io(#[from] std::io::Error),
}

/// Compiles script sources into executable units.
///
/// Called once per distinct source, before any submission is possible.
pub trait ScriptCompiler: Send + Sync {
    fn compile(&self, source: &Path, inputs: Vec<String>) -> Result<Arc<ExecutableUnit>, CompileError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
