//! Scriptable backend used by the unit tests.

use crate::backend::{Backend, BackendError};
use dlview_core::{
    Breakpoint, DebuggerState, EvalScope, Function, Goroutine, Kind, LoadConfig, Location,
    Stackframe, Thread, Variable,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Default)]
struct MockState {
    goroutines: Vec<Goroutine>,
    threads: Vec<Thread>,
    stack: Vec<Stackframe>,
    args: Vec<Variable>,
    locals: Vec<Variable>,
    globals: Vec<Variable>,
    registers: String,
    breakpoints: Vec<Breakpoint>,
    evals: HashMap<String, Variable>,
    failing: HashSet<&'static str>,
    calls: HashMap<&'static str, usize>,
    last_stack: Option<(i64, usize)>,
    eval_exprs: Vec<String>,
    cleared: Vec<i64>,
    amended: Vec<Breakpoint>,
    switch_state: DebuggerState,
}

#[derive(Default)]
pub(crate) struct MockBackend {
    state: Mutex<MockState>,
    held: Mutex<bool>,
    released: Condvar,
}

impl MockBackend {
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }

    fn enter(&self, method: &'static str) -> Result<MutexGuard<'_, MockState>, BackendError> {
        let mut state = self.state();
        *state.calls.entry(method).or_default() += 1;
        if state.failing.contains(method) {
            return Err(BackendError::Request("boom".to_string()));
        }
        Ok(state)
    }

    pub(crate) fn set_goroutines(&self, ids: &[i64]) {
        self.state().goroutines = ids
            .iter()
            .map(|&id| Goroutine {
                id,
                ..Goroutine::default()
            })
            .collect();
    }

    pub(crate) fn set_threads(&self, ids: &[i64]) {
        self.state().threads = ids
            .iter()
            .map(|&id| Thread {
                id,
                ..Thread::default()
            })
            .collect();
    }

    pub(crate) fn set_stack(&self, depth: usize) {
        self.state().stack = (0..depth)
            .map(|idx| Stackframe {
                location: Location {
                    pc: 0x1000 + idx as u64,
                    file: "/src/app/main.go".to_string(),
                    line: 10 + idx as u32,
                    function: Some(Function {
                        name: format!("main.f{idx}"),
                    }),
                },
            })
            .collect();
    }

    pub(crate) fn set_args(&self, args: Vec<Variable>) {
        self.state().args = args;
    }

    pub(crate) fn set_locals(&self, locals: Vec<Variable>) {
        self.state().locals = locals;
    }

    pub(crate) fn set_globals(&self, globals: Vec<Variable>) {
        self.state().globals = globals;
    }

    pub(crate) fn set_registers(&self, registers: &str) {
        self.state().registers = registers.to_string();
    }

    pub(crate) fn set_breakpoints(&self, ids: &[i64]) {
        self.state().breakpoints = ids
            .iter()
            .map(|&id| Breakpoint {
                id,
                name: format!("bp{id}"),
                ..Breakpoint::default()
            })
            .collect();
    }

    pub(crate) fn set_switch_state(&self, state: DebuggerState) {
        self.state().switch_state = state;
    }

    pub(crate) fn respond(&self, expr: &str, variable: Variable) {
        self.state().evals.insert(expr.to_string(), variable);
    }

    pub(crate) fn fail(&self, method: &'static str) {
        self.state().failing.insert(method);
    }

    pub(crate) fn recover(&self, method: &'static str) {
        self.state().failing.remove(method);
    }

    pub(crate) fn calls(&self, method: &'static str) -> usize {
        self.state().calls.get(method).copied().unwrap_or(0)
    }

    pub(crate) fn last_stack_request(&self) -> Option<(i64, usize)> {
        self.state().last_stack
    }

    pub(crate) fn eval_exprs(&self) -> Vec<String> {
        self.state().eval_exprs.clone()
    }

    pub(crate) fn cleared(&self) -> Vec<i64> {
        self.state().cleared.clone()
    }

    pub(crate) fn amended(&self) -> Vec<Breakpoint> {
        self.state().amended.clone()
    }

    /// Makes evaluation calls block until `release_evals`.
    pub(crate) fn hold_evals(&self) {
        *self.held.lock().expect("gate poisoned") = true;
    }

    pub(crate) fn release_evals(&self) {
        *self.held.lock().expect("gate poisoned") = false;
        self.released.notify_all();
    }

    fn wait_for_gate(&self) {
        let held = self.held.lock().expect("gate poisoned");
        let _released = self
            .released
            .wait_timeout_while(held, Duration::from_secs(5), |held| *held)
            .expect("gate poisoned");
    }
}

impl Backend for MockBackend {
    fn list_goroutines(&self) -> Result<Vec<Goroutine>, BackendError> {
        Ok(self.enter("list_goroutines")?.goroutines.clone())
    }

    fn stacktrace(&self, goroutine_id: i64, depth: usize) -> Result<Vec<Stackframe>, BackendError> {
        let mut state = self.enter("stacktrace")?;
        state.last_stack = Some((goroutine_id, depth));
        Ok(state.stack.iter().take(depth).cloned().collect())
    }

    fn list_threads(&self) -> Result<Vec<Thread>, BackendError> {
        Ok(self.enter("list_threads")?.threads.clone())
    }

    fn list_function_args(
        &self,
        _scope: EvalScope,
        _load: LoadConfig,
    ) -> Result<Vec<Variable>, BackendError> {
        Ok(self.enter("list_function_args")?.args.clone())
    }

    fn list_local_variables(
        &self,
        _scope: EvalScope,
        _load: LoadConfig,
    ) -> Result<Vec<Variable>, BackendError> {
        Ok(self.enter("list_local_variables")?.locals.clone())
    }

    fn list_registers(&self) -> Result<String, BackendError> {
        Ok(self.enter("list_registers")?.registers.clone())
    }

    fn list_package_variables(
        &self,
        _filter: &str,
        _load: LoadConfig,
    ) -> Result<Vec<Variable>, BackendError> {
        Ok(self.enter("list_package_variables")?.globals.clone())
    }

    fn list_breakpoints(&self) -> Result<Vec<Breakpoint>, BackendError> {
        Ok(self.enter("list_breakpoints")?.breakpoints.clone())
    }

    fn clear_breakpoint(&self, id: i64) -> Result<(), BackendError> {
        let mut state = self.enter("clear_breakpoint")?;
        state.cleared.push(id);
        state.breakpoints.retain(|bp| bp.id != id);
        Ok(())
    }

    fn amend_breakpoint(&self, breakpoint: &Breakpoint) -> Result<(), BackendError> {
        let mut state = self.enter("amend_breakpoint")?;
        state.amended.push(breakpoint.clone());
        Ok(())
    }

    fn eval_variable(
        &self,
        _scope: EvalScope,
        expr: &str,
        _load: LoadConfig,
    ) -> Result<Variable, BackendError> {
        let response = {
            let mut state = self.state();
            *state.calls.entry("eval_variable").or_default() += 1;
            state.eval_exprs.push(expr.to_string());
            if state.failing.contains("eval_variable") {
                Err(BackendError::Request("boom".to_string()))
            } else {
                state
                    .evals
                    .get(expr)
                    .cloned()
                    .ok_or_else(|| BackendError::Request(format!("could not evaluate {expr}")))
            }
        };
        self.wait_for_gate();
        response
    }

    fn switch_goroutine(&self, _id: i64) -> Result<DebuggerState, BackendError> {
        Ok(self.enter("switch_goroutine")?.switch_state.clone())
    }

    fn switch_thread(&self, _id: i64) -> Result<DebuggerState, BackendError> {
        Ok(self.enter("switch_thread")?.switch_state.clone())
    }
}

pub(crate) fn int_var(name: &str, value: &str) -> Variable {
    Variable {
        name: name.to_string(),
        addr: 0xc000_0100,
        type_name: "int".to_string(),
        kind: Kind::Int,
        value: value.to_string(),
        ..Variable::default()
    }
}

pub(crate) fn slice_var(name: &str, addr: u64, len: i64, values: &[&str]) -> Variable {
    Variable {
        name: name.to_string(),
        addr,
        type_name: "[]int".to_string(),
        kind: Kind::Slice,
        len,
        cap: len,
        children: values.iter().map(|value| int_var("", value)).collect(),
        ..Variable::default()
    }
}

pub(crate) fn map_var(name: &str, addr: u64, len: i64, pairs: &[(&str, &str)]) -> Variable {
    Variable {
        name: name.to_string(),
        addr,
        type_name: "map[string]int".to_string(),
        kind: Kind::Map,
        len,
        children: pairs
            .iter()
            .flat_map(|(key, value)| {
                [
                    Variable {
                        addr: addr + 0x10,
                        type_name: "string".to_string(),
                        kind: Kind::String,
                        value: key.to_string(),
                        len: key.len() as i64,
                        ..Variable::default()
                    },
                    int_var("", value),
                ]
            })
            .collect(),
        ..Variable::default()
    }
}

pub(crate) fn struct_var(name: &str, addr: u64, len: i64, fields: Vec<Variable>) -> Variable {
    Variable {
        name: name.to_string(),
        addr,
        type_name: "main.Config".to_string(),
        kind: Kind::Struct,
        len,
        children: fields,
        ..Variable::default()
    }
}
