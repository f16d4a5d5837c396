//! Runtime compilation and loading of the generated evaluators.
//!
//! The pipeline is deliberately boring: write the generated C source into
//! a unique scratch directory, shell out to the system C compiler for a
//! position-independent shared object, open it, and resolve the entry
//! points. The returned [`JitLibrary`] owns both the library and the
//! scratch directory; every resolved pointer aliases into the library,
//! so the handle must outlive all of them.

use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;

use libloading::Library;
use mpc_core::{ParamEvalFn, StateEvalFn};
use tempfile::TempDir;

use crate::error::{SymError, SymResult};

/// Default compiler executable used to build evaluator objects.
pub const RUNTIME_COMPILER_PATH: &str = "cc";

/// Flags handed to the compiler ahead of the source and output paths.
pub const RUNTIME_COMPILER_FLAGS: &[&str] = &["-shared", "-fPIC", "-O2"];

/// Resolve the compiler once per process. `MPC_RUNTIME_CC` overrides the
/// default for cross or hermetic builds; nothing is required in the
/// common case.
fn compiler_path() -> &'static str {
    static PATH: OnceLock<String> = OnceLock::new();
    PATH.get_or_init(|| {
        std::env::var("MPC_RUNTIME_CC").unwrap_or_else(|_| RUNTIME_COMPILER_PATH.to_string())
    })
}

/// An opaque handle owning a runtime-compiled shared object.
///
/// Dropping the handle unloads the library and deletes the scratch
/// directory, invalidating every pointer resolved from it.
pub struct JitLibrary {
    library: Library,
    // Keeps the source and artifact alive alongside the mapping
    _scratch: TempDir,
}

impl JitLibrary {
    /// Compile `source` into a shared object and load it.
    ///
    /// Fails with [`SymError::CompileFailed`] on a nonzero compiler exit
    /// (carrying the compiler diagnostics) and [`SymError::LoadFailed`]
    /// if the artifact cannot be opened.
    pub fn compile_and_load(source: &str) -> SymResult<Self> {
        let scratch = TempDir::new()?;
        let source_path = scratch.path().join("evaluators.c");
        let object_path = scratch.path().join("evaluators.so");
        std::fs::write(&source_path, source)?;

        Self::compile(&source_path, &object_path)?;

        let library = unsafe { Library::new(&object_path) }?;
        Ok(Self {
            library,
            _scratch: scratch,
        })
    }

    fn compile(source_path: &Path, object_path: &Path) -> SymResult<()> {
        let output = Command::new(compiler_path())
            .args(RUNTIME_COMPILER_FLAGS)
            .arg(source_path)
            .arg("-o")
            .arg(object_path)
            .arg("-lm")
            .output()?;

        if !output.status.success() {
            return Err(SymError::CompileFailed(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }
        Ok(())
    }

    /// Resolve a `(state, param, out)` evaluator by name.
    pub fn get_state_fn(&self, name: &str) -> SymResult<StateEvalFn> {
        unsafe {
            let symbol = self
                .library
                .get::<StateEvalFn>(name.as_bytes())
                .map_err(|_| SymError::SymbolMissing(name.to_string()))?;
            Ok(*symbol)
        }
    }

    /// Resolve a `(param, out)` evaluator by name.
    pub fn get_param_fn(&self, name: &str) -> SymResult<ParamEvalFn> {
        unsafe {
            let symbol = self
                .library
                .get::<ParamEvalFn>(name.as_bytes())
                .map_err(|_| SymError::SymbolMissing(name.to_string()))?;
            Ok(*symbol)
        }
    }
}

impl std::fmt::Debug for JitLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JitLibrary").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_load_and_call() {
        let source = r#"
#include <math.h>

void doubler(const double* state, const double* param, double* out) {
    out[0] = 2.0 * state[0];
}
"#;
        let library = JitLibrary::compile_and_load(source).unwrap();
        let doubler = library.get_state_fn("doubler").unwrap();

        let state = [21.0];
        let mut out = [0.0];
        unsafe { doubler(state.as_ptr(), std::ptr::null(), out.as_mut_ptr()) };
        assert_eq!(out[0], 42.0);
    }

    #[test]
    fn test_compile_failure_carries_diagnostics() {
        let result = JitLibrary::compile_and_load("this is not C\n");
        match result {
            Err(SymError::CompileFailed(diagnostics)) => {
                assert!(!diagnostics.is_empty());
            }
            other => panic!("expected CompileFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_symbol() {
        let library = JitLibrary::compile_and_load("void present(void) {}\n").unwrap();
        assert!(matches!(
            library.get_state_fn("absent"),
            Err(SymError::SymbolMissing(_))
        ));
    }
}
