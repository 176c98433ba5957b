//! Fetch-and-transform routines behind each panel.

use crate::backend::{Backend, BackendError};
use crate::panel::PanelKind;
use dlview_core::listing::{sort_and_resolve, sort_by_id, sort_by_name};
use dlview_core::{Breakpoint, EvalScope, Goroutine, LoadConfig, Stackframe, Thread, ValueNode};
use thiserror::Error;

/// Snapshot of the session a load runs against, taken when it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadRequest {
    pub scope: EvalScope,
    pub stack_depth: usize,
    pub load: LoadConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalsData {
    pub args: Vec<ValueNode>,
    pub locals: Vec<ValueNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelData {
    Goroutines(Vec<Goroutine>),
    Stack(Vec<Stackframe>),
    Threads(Vec<Thread>),
    Locals(LocalsData),
    Registers(String),
    Globals(Vec<ValueNode>),
    Breakpoints(Vec<Breakpoint>),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{context}: {source}")]
pub struct LoadError {
    pub context: &'static str,
    pub source: BackendError,
}

impl LoadError {
    pub fn new(context: &'static str, source: BackendError) -> Self {
        Self { context, source }
    }

    /// Error for a load that failed outside the query itself.
    pub fn for_panel(panel: PanelKind, source: BackendError) -> Self {
        Self::new(context_for(panel), source)
    }
}

fn context_for(panel: PanelKind) -> &'static str {
    match panel {
        PanelKind::Goroutines => "Could not list goroutines",
        PanelKind::Stack => "Could not stacktrace",
        PanelKind::Threads => "Could not list threads",
        PanelKind::Locals => "Could not list local variables",
        PanelKind::Registers => "Could not list registers",
        PanelKind::Globals => "Could not list global variables",
        PanelKind::Breakpoints => "Could not list breakpoints",
    }
}

pub fn load(
    panel: PanelKind,
    backend: &dyn Backend,
    request: &LoadRequest,
) -> Result<PanelData, LoadError> {
    match panel {
        PanelKind::Goroutines => load_goroutines(backend).map(PanelData::Goroutines),
        PanelKind::Stack => load_stack(backend, request).map(PanelData::Stack),
        PanelKind::Threads => load_threads(backend).map(PanelData::Threads),
        PanelKind::Locals => load_locals(backend, request).map(PanelData::Locals),
        PanelKind::Registers => load_registers(backend).map(PanelData::Registers),
        PanelKind::Globals => load_globals(backend, request).map(PanelData::Globals),
        PanelKind::Breakpoints => load_breakpoints(backend).map(PanelData::Breakpoints),
    }
}

pub fn load_goroutines(backend: &dyn Backend) -> Result<Vec<Goroutine>, LoadError> {
    let mut goroutines = backend
        .list_goroutines()
        .map_err(|err| LoadError::for_panel(PanelKind::Goroutines, err))?;
    sort_by_id(&mut goroutines);
    Ok(goroutines)
}

pub fn load_stack(
    backend: &dyn Backend,
    request: &LoadRequest,
) -> Result<Vec<Stackframe>, LoadError> {
    backend
        .stacktrace(request.scope.goroutine_id, request.stack_depth)
        .map_err(|err| LoadError::for_panel(PanelKind::Stack, err))
}

pub fn load_threads(backend: &dyn Backend) -> Result<Vec<Thread>, LoadError> {
    let mut threads = backend
        .list_threads()
        .map_err(|err| LoadError::for_panel(PanelKind::Threads, err))?;
    sort_by_id(&mut threads);
    Ok(threads)
}

pub fn load_locals(backend: &dyn Backend, request: &LoadRequest) -> Result<LocalsData, LoadError> {
    let args = backend
        .list_function_args(request.scope, request.load)
        .map_err(|err| LoadError::new("Could not list function arguments", err))?;
    let locals = backend
        .list_local_variables(request.scope, request.load)
        .map_err(|err| LoadError::for_panel(PanelKind::Locals, err))?;

    let mut data = LocalsData {
        args: args.into_iter().map(ValueNode::from).collect(),
        locals: locals.into_iter().map(ValueNode::from).collect(),
    };
    sort_and_resolve(&mut [&mut data.args, &mut data.locals]);
    Ok(data)
}

pub fn load_registers(backend: &dyn Backend) -> Result<String, LoadError> {
    backend
        .list_registers()
        .map_err(|err| LoadError::for_panel(PanelKind::Registers, err))
}

pub fn load_globals(
    backend: &dyn Backend,
    request: &LoadRequest,
) -> Result<Vec<ValueNode>, LoadError> {
    let globals = backend
        .list_package_variables("", request.load)
        .map_err(|err| LoadError::for_panel(PanelKind::Globals, err))?;
    let mut globals: Vec<ValueNode> = globals.into_iter().map(ValueNode::from).collect();
    sort_by_name(&mut globals);
    Ok(globals)
}

pub fn load_breakpoints(backend: &dyn Backend) -> Result<Vec<Breakpoint>, LoadError> {
    let mut breakpoints = backend
        .list_breakpoints()
        .map_err(|err| LoadError::for_panel(PanelKind::Breakpoints, err))?;
    sort_by_id(&mut breakpoints);
    Ok(breakpoints)
}

/// Rows a register dump needs.
pub fn register_lines(registers: &str) -> usize {
    1 + registers.bytes().filter(|b| *b == b'\n').count()
}
