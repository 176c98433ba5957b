use dlview_core::{
    Breakpoint, DebuggerState, EvalScope, Goroutine, LoadConfig, Stackframe, Thread, Variable,
};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("{0}")]
    Request(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("background task failed: {0}")]
    Task(String),
}

/// Queries the inspection layer issues against the debugging backend.
///
/// Every call is a blocking request; the inspector only ever invokes these
/// from background work, never from the render loop.
pub trait Backend: Send + Sync {
    fn list_goroutines(&self) -> Result<Vec<Goroutine>, BackendError>;

    fn stacktrace(&self, goroutine_id: i64, depth: usize) -> Result<Vec<Stackframe>, BackendError>;

    fn list_threads(&self) -> Result<Vec<Thread>, BackendError>;

    fn list_function_args(
        &self,
        scope: EvalScope,
        load: LoadConfig,
    ) -> Result<Vec<Variable>, BackendError>;

    fn list_local_variables(
        &self,
        scope: EvalScope,
        load: LoadConfig,
    ) -> Result<Vec<Variable>, BackendError>;

    fn list_registers(&self) -> Result<String, BackendError>;

    fn list_package_variables(
        &self,
        filter: &str,
        load: LoadConfig,
    ) -> Result<Vec<Variable>, BackendError>;

    fn list_breakpoints(&self) -> Result<Vec<Breakpoint>, BackendError>;

    fn clear_breakpoint(&self, id: i64) -> Result<(), BackendError>;

    fn amend_breakpoint(&self, breakpoint: &Breakpoint) -> Result<(), BackendError>;

    fn eval_variable(
        &self,
        scope: EvalScope,
        expr: &str,
        load: LoadConfig,
    ) -> Result<Variable, BackendError>;

    fn switch_goroutine(&self, id: i64) -> Result<DebuggerState, BackendError>;

    fn switch_thread(&self, id: i64) -> Result<DebuggerState, BackendError>;
}

/// Runs a blocking backend call off the async runtime, bounded by `timeout`.
///
/// A timed out call keeps running on its blocking thread; its result is
/// discarded.
pub(crate) async fn run_blocking<T, F>(timeout: Option<Duration>, call: F) -> Result<T, BackendError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::task::spawn_blocking(call);
    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined,
            Err(_) => return Err(BackendError::Timeout(limit)),
        },
        None => handle.await,
    };
    joined.map_err(|err| BackendError::Task(err.to_string()))
}
