//! Replays a captured debugger snapshot as a backend.

use dlview_core::{
    Breakpoint, DebuggerState, EvalScope, Goroutine, LoadConfig, Stackframe, Thread, Variable,
};
use dlview_inspect::{Backend, BackendError};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("could not read fixture {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("could not parse fixture {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub state: DebuggerState,
    #[serde(default)]
    pub goroutines: Vec<Goroutine>,
    #[serde(default)]
    pub threads: Vec<Thread>,
    /// Stack per goroutine ID, innermost frame first.
    #[serde(default)]
    pub stacks: HashMap<i64, Vec<Stackframe>>,
    #[serde(default)]
    pub args: Vec<Variable>,
    #[serde(default)]
    pub locals: Vec<Variable>,
    #[serde(default)]
    pub registers: String,
    #[serde(default)]
    pub globals: Vec<Variable>,
    #[serde(default)]
    pub breakpoints: Vec<Breakpoint>,
    /// Canned answers for expression evaluation, keyed by expression.
    #[serde(default)]
    pub evals: HashMap<String, Variable>,
}

pub struct FixtureBackend {
    snapshot: Mutex<Snapshot>,
}

impl FixtureBackend {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
        }
    }

    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let raw = fs::read_to_string(path).map_err(|source| FixtureError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot = serde_json::from_str(&raw).map_err(|source| FixtureError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(snapshot))
    }

    pub fn state(&self) -> Result<DebuggerState, BackendError> {
        Ok(self.snapshot()?.state.clone())
    }

    fn snapshot(&self) -> Result<MutexGuard<'_, Snapshot>, BackendError> {
        self.snapshot
            .lock()
            .map_err(|_| BackendError::Request("fixture state poisoned".to_string()))
    }
}

impl Backend for FixtureBackend {
    fn list_goroutines(&self) -> Result<Vec<Goroutine>, BackendError> {
        Ok(self.snapshot()?.goroutines.clone())
    }

    fn stacktrace(&self, goroutine_id: i64, depth: usize) -> Result<Vec<Stackframe>, BackendError> {
        let snapshot = self.snapshot()?;
        let frames = snapshot
            .stacks
            .get(&goroutine_id)
            .ok_or_else(|| BackendError::Request(format!("unknown goroutine {goroutine_id}")))?;
        Ok(frames.iter().take(depth).cloned().collect())
    }

    fn list_threads(&self) -> Result<Vec<Thread>, BackendError> {
        Ok(self.snapshot()?.threads.clone())
    }

    fn list_function_args(
        &self,
        _scope: EvalScope,
        _load: LoadConfig,
    ) -> Result<Vec<Variable>, BackendError> {
        Ok(self.snapshot()?.args.clone())
    }

    fn list_local_variables(
        &self,
        _scope: EvalScope,
        _load: LoadConfig,
    ) -> Result<Vec<Variable>, BackendError> {
        Ok(self.snapshot()?.locals.clone())
    }

    fn list_registers(&self) -> Result<String, BackendError> {
        Ok(self.snapshot()?.registers.clone())
    }

    fn list_package_variables(
        &self,
        filter: &str,
        _load: LoadConfig,
    ) -> Result<Vec<Variable>, BackendError> {
        let snapshot = self.snapshot()?;
        Ok(snapshot
            .globals
            .iter()
            .filter(|var| var.name.contains(filter))
            .cloned()
            .collect())
    }

    fn list_breakpoints(&self) -> Result<Vec<Breakpoint>, BackendError> {
        Ok(self.snapshot()?.breakpoints.clone())
    }

    fn clear_breakpoint(&self, id: i64) -> Result<(), BackendError> {
        let mut snapshot = self.snapshot()?;
        let before = snapshot.breakpoints.len();
        snapshot.breakpoints.retain(|bp| bp.id != id);
        if snapshot.breakpoints.len() == before {
            return Err(BackendError::Request(format!("no breakpoint with id {id}")));
        }
        Ok(())
    }

    fn amend_breakpoint(&self, breakpoint: &Breakpoint) -> Result<(), BackendError> {
        let mut snapshot = self.snapshot()?;
        let slot = snapshot
            .breakpoints
            .iter_mut()
            .find(|bp| bp.id == breakpoint.id)
            .ok_or_else(|| BackendError::Request(format!("no breakpoint with id {}", breakpoint.id)))?;
        *slot = breakpoint.clone();
        Ok(())
    }

    fn eval_variable(
        &self,
        _scope: EvalScope,
        expr: &str,
        _load: LoadConfig,
    ) -> Result<Variable, BackendError> {
        self.snapshot()?
            .evals
            .get(expr)
            .cloned()
            .ok_or_else(|| BackendError::Request(format!("could not evaluate {expr}")))
    }

    fn switch_goroutine(&self, id: i64) -> Result<DebuggerState, BackendError> {
        let mut snapshot = self.snapshot()?;
        let thread_id = snapshot
            .goroutines
            .iter()
            .find(|g| g.id == id)
            .map(|g| g.thread_id)
            .ok_or_else(|| BackendError::Request(format!("unknown goroutine {id}")))?;
        snapshot.state.current_goroutine_id = Some(id);
        snapshot.state.current_thread_id = (thread_id != 0).then_some(thread_id);
        Ok(snapshot.state.clone())
    }

    fn switch_thread(&self, id: i64) -> Result<DebuggerState, BackendError> {
        let mut snapshot = self.snapshot()?;
        let goroutine_id = snapshot
            .threads
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.goroutine_id)
            .ok_or_else(|| BackendError::Request(format!("unknown thread {id}")))?;
        snapshot.state.current_thread_id = Some(id);
        if goroutine_id != 0 {
            snapshot.state.current_goroutine_id = Some(goroutine_id);
        }
        Ok(snapshot.state.clone())
    }
}
