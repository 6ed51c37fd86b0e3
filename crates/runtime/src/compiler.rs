//! Compiler for scripts run by the external interpreter.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use pvscript_core::scripting::{CompileError, ExecutableUnit, ScriptCompiler};

/// Produces gateway units for script files.
///
/// The file is only checked for existence here; the interpreter parses it
/// on each call. Compiling the same file with the same inputs again
/// returns the cached unit, so widgets sharing a script share its pending
/// entry as well.
#[derive(Debug, Default)]
pub struct GatewayCompiler {
    cache: DashMap<(PathBuf, Vec<String>), Arc<ExecutableUnit>>,
}

impl GatewayCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct units compiled so far.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl ScriptCompiler for GatewayCompiler {
    fn compile(&self, source: &Path, inputs: Vec<String>) -> Result<Arc<ExecutableUnit>, CompileError> {
        let metadata = std::fs::metadata(source).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => CompileError::NotFound(source.to_path_buf()),
            _ => CompileError::Io(e),
        })?;
        if !metadata.is_file() {
            return Err(CompileError::NotAFile(source.to_path_buf()));
        }

        let canonical = std::fs::canonicalize(source)?;
        let unit = self
            .cache
            .entry((canonical.clone(), inputs.clone()))
            .or_insert_with(|| {
                tracing::debug!(script = %canonical.display(), "Compiled gateway script");
                ExecutableUnit::gateway(canonical, inputs)
            })
            .clone();
        Ok(unit)
    }
}
