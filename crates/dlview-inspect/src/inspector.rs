//! Application context tying panels, loaders and expansion together.
//!
//! The render loop owns the [`Inspector`]. Background work never touches its
//! state directly: every backend call runs on a blocking thread and reports
//! back through the update channel, which the render loop drains with
//! [`Inspector::pump`] or [`Inspector::changed`]. Results carry the panel
//! epoch they were started under and are dropped when it has moved on.

use crate::backend::{run_blocking, Backend, BackendError};
use crate::config::{clamp_stack_depth, InspectorConfig};
use crate::expander::{ExpandPlan, SingleFlightExpander, VarPath, VarRoot};
use crate::loaders::{self, LoadError, LoadRequest, LocalsData, PanelData};
use crate::panel::{
    Completion, LoadTicket, Panel, PanelKind, PanelPoll, PanelState, Placeholder, Readiness,
};
use crate::view::{ExpansionState, RowContext, VarView};
use dlview_core::listing::sanitize_filter;
use dlview_core::{
    Breakpoint, DebuggerState, EvalScope, Goroutine, GoroutineLocation, Stackframe, Thread,
    ValueNode,
};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Why a group of panels is being invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidateReason {
    /// The target stopped; everything may have changed.
    Stop,
    GoroutineSwitch,
    FrameSwitch,
}

impl InvalidateReason {
    pub fn panels(self) -> &'static [PanelKind] {
        match self {
            InvalidateReason::Stop => &PanelKind::ALL,
            InvalidateReason::GoroutineSwitch => &[
                PanelKind::Goroutines,
                PanelKind::Stack,
                PanelKind::Threads,
                PanelKind::Locals,
                PanelKind::Registers,
            ],
            InvalidateReason::FrameSwitch => &[PanelKind::Locals],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Session {
    pub goroutine_id: i64,
    pub frame: usize,
    pub thread_id: Option<i64>,
    pub running: bool,
}

impl Session {
    pub fn scope(&self) -> EvalScope {
        EvalScope {
            goroutine_id: self.goroutine_id,
            frame: self.frame,
        }
    }
}

/// What a panel shows on this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelView<T> {
    Placeholder(Placeholder),
    Ready(T),
}

impl<T> PanelView<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            PanelView::Ready(value) => Some(value),
            PanelView::Placeholder(_) => None,
        }
    }
}

#[derive(Debug)]
enum Update {
    Loaded {
        ticket: LoadTicket,
        result: Result<PanelData, LoadError>,
    },
    Expanded {
        path: VarPath,
        plan: ExpandPlan,
        epoch: u64,
        result: Result<ValueNode, BackendError>,
    },
    Switched {
        state: DebuggerState,
        reason: InvalidateReason,
    },
    /// Command finished: log its failures, then clear `panels`.
    Refresh {
        log: Vec<String>,
        panels: &'static [PanelKind],
    },
    Log(String),
}

pub struct Inspector {
    config: InspectorConfig,
    backend: Option<Arc<dyn Backend>>,
    session: Session,
    goroutines: Panel<Vec<Goroutine>>,
    stack: Panel<Vec<Stackframe>>,
    threads: Panel<Vec<Thread>>,
    locals: Panel<LocalsData>,
    registers: Panel<String>,
    globals: Panel<Vec<ValueNode>>,
    breakpoints: Panel<Vec<Breakpoint>>,
    expander: SingleFlightExpander,
    tx: mpsc::UnboundedSender<Update>,
    rx: mpsc::UnboundedReceiver<Update>,
    console: VecDeque<String>,
    locals_filter: String,
    globals_filter: String,
    show_address: bool,
    goroutine_location: GoroutineLocation,
}

impl Inspector {
    /// Creates a detached inspector. Loads are spawned on the ambient tokio
    /// runtime, so views must be requested from within one.
    pub fn new(config: InspectorConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            config,
            backend: None,
            session: Session::default(),
            goroutines: Panel::new(PanelKind::Goroutines),
            stack: Panel::new(PanelKind::Stack),
            threads: Panel::new(PanelKind::Threads),
            locals: Panel::new(PanelKind::Locals),
            registers: Panel::new(PanelKind::Registers),
            globals: Panel::new(PanelKind::Globals),
            breakpoints: Panel::new(PanelKind::Breakpoints),
            expander: SingleFlightExpander::new(),
            tx,
            rx,
            console: VecDeque::new(),
            locals_filter: String::new(),
            globals_filter: String::new(),
            show_address: false,
            goroutine_location: GoroutineLocation::default(),
        }
    }

    pub fn attach(&mut self, backend: Arc<dyn Backend>, state: DebuggerState) {
        info!(event = "attached", goroutine = ?state.current_goroutine_id);
        self.backend = Some(backend);
        self.apply_state(&state);
        self.session.running = state.running;
        self.invalidate(InvalidateReason::Stop);
    }

    pub fn config(&self) -> &InspectorConfig {
        &self.config
    }

    pub fn session(&self) -> Session {
        self.session
    }

    pub fn is_connected(&self) -> bool {
        self.backend.is_some()
    }

    /// Marks the target as running or stopped. Stopping invalidates every
    /// panel.
    pub fn set_running(&mut self, running: bool) {
        self.session.running = running;
        if !running {
            self.invalidate(InvalidateReason::Stop);
        }
    }

    pub fn clear(&mut self, kind: PanelKind) {
        self.panel_mut(kind).clear();
    }

    pub fn invalidate(&mut self, reason: InvalidateReason) {
        for &kind in reason.panels() {
            self.clear(kind);
        }
    }

    pub fn is_loading(&self, kind: PanelKind) -> bool {
        self.panel(kind).is_loading()
    }

    pub fn is_loaded(&self, kind: PanelKind) -> bool {
        self.panel(kind).is_loaded()
    }

    fn panel(&self, kind: PanelKind) -> &dyn PanelState {
        match kind {
            PanelKind::Goroutines => &self.goroutines,
            PanelKind::Stack => &self.stack,
            PanelKind::Threads => &self.threads,
            PanelKind::Locals => &self.locals,
            PanelKind::Registers => &self.registers,
            PanelKind::Globals => &self.globals,
            PanelKind::Breakpoints => &self.breakpoints,
        }
    }

    fn panel_mut(&mut self, kind: PanelKind) -> &mut dyn PanelState {
        match kind {
            PanelKind::Goroutines => &mut self.goroutines,
            PanelKind::Stack => &mut self.stack,
            PanelKind::Threads => &mut self.threads,
            PanelKind::Locals => &mut self.locals,
            PanelKind::Registers => &mut self.registers,
            PanelKind::Globals => &mut self.globals,
            PanelKind::Breakpoints => &mut self.breakpoints,
        }
    }

    fn readiness(&self) -> Readiness {
        Readiness {
            connected: self.backend.is_some(),
            running: self.session.running,
        }
    }

    /// Advances a panel's state for one render tick, starting its load when
    /// needed. Returns the placeholder to show, if any.
    fn poll_panel(&mut self, kind: PanelKind) -> Option<Placeholder> {
        let readiness = self.readiness();
        match self.panel_mut(kind).poll(readiness) {
            PanelPoll::Ready => None,
            PanelPoll::Placeholder(placeholder) => Some(placeholder),
            PanelPoll::Start(ticket) => {
                self.spawn_load(ticket);
                Some(Placeholder::Loading)
            }
        }
    }

    fn spawn_load(&mut self, ticket: LoadTicket) {
        let Some(backend) = self.backend.clone() else {
            self.panel_mut(ticket.panel).fail(ticket.epoch);
            return;
        };
        let request = LoadRequest {
            scope: self.session.scope(),
            stack_depth: self.config.stack_depth,
            load: self.config.load,
        };
        let timeout = self.config.backend_timeout;
        let tx = self.tx.clone();
        debug!(event = "panel_load_start", panel = %ticket.panel, epoch = ticket.epoch);
        tokio::spawn(async move {
            let call = move || loaders::load(ticket.panel, backend.as_ref(), &request);
            let result = match run_blocking(timeout, call).await {
                Ok(result) => result,
                Err(err) => Err(LoadError::for_panel(ticket.panel, err)),
            };
            let _ = tx.send(Update::Loaded { ticket, result });
        });
    }

    pub fn goroutines_view(&mut self) -> PanelView<&[Goroutine]> {
        match self.poll_panel(PanelKind::Goroutines) {
            Some(placeholder) => PanelView::Placeholder(placeholder),
            None => PanelView::Ready(self.goroutines.data().as_slice()),
        }
    }

    pub fn stack_view(&mut self) -> PanelView<&[Stackframe]> {
        match self.poll_panel(PanelKind::Stack) {
            Some(placeholder) => PanelView::Placeholder(placeholder),
            None => PanelView::Ready(self.stack.data().as_slice()),
        }
    }

    pub fn threads_view(&mut self) -> PanelView<&[Thread]> {
        match self.poll_panel(PanelKind::Threads) {
            Some(placeholder) => PanelView::Placeholder(placeholder),
            None => PanelView::Ready(self.threads.data().as_slice()),
        }
    }

    pub fn registers_view(&mut self) -> PanelView<&str> {
        match self.poll_panel(PanelKind::Registers) {
            Some(placeholder) => PanelView::Placeholder(placeholder),
            None => PanelView::Ready(self.registers.data().as_str()),
        }
    }

    pub fn breakpoints_view(&mut self) -> PanelView<&[Breakpoint]> {
        match self.poll_panel(PanelKind::Breakpoints) {
            Some(placeholder) => PanelView::Placeholder(placeholder),
            None => PanelView::Ready(self.breakpoints.data().as_slice()),
        }
    }

    /// Rows for function arguments and local variables. Opened structs that
    /// still lack their fields are reloaded in the background.
    pub fn locals_view(&mut self, expanded: &dyn ExpansionState) -> PanelView<VarView> {
        if let Some(placeholder) = self.poll_panel(PanelKind::Locals) {
            return PanelView::Placeholder(placeholder);
        }
        let ctx = RowContext {
            show_address: self.show_address,
            expanded,
        };
        let data = self.locals.data();
        let mut view = VarView::new();
        view.render_list(&data.args, VarRoot::Arg, &self.locals_filter, ctx);
        let mut locals = VarView::new();
        locals.render_list(&data.locals, VarRoot::Local, &self.locals_filter, ctx);
        if !view.rows.is_empty() && !locals.rows.is_empty() {
            view.separator(VarPath::new(VarRoot::Local(0)));
        }
        view.rows.append(&mut locals.rows);
        view.pending.append(&mut locals.pending);
        self.reload_pending(&view);
        PanelView::Ready(view)
    }

    pub fn globals_view(&mut self, expanded: &dyn ExpansionState) -> PanelView<VarView> {
        if let Some(placeholder) = self.poll_panel(PanelKind::Globals) {
            return PanelView::Placeholder(placeholder);
        }
        let ctx = RowContext {
            show_address: self.show_address,
            expanded,
        };
        let mut view = VarView::new();
        view.render_list(self.globals.data(), VarRoot::Global, &self.globals_filter, ctx);
        self.reload_pending(&view);
        PanelView::Ready(view)
    }

    fn reload_pending(&mut self, view: &VarView) {
        for path in &view.pending {
            self.load_more(path);
        }
    }

    pub fn node(&self, path: &VarPath) -> Option<&ValueNode> {
        let root = match path.root {
            VarRoot::Arg(idx) => self.locals.data().args.get(idx),
            VarRoot::Local(idx) => self.locals.data().locals.get(idx),
            VarRoot::Global(idx) => self.globals.data().get(idx),
        }?;
        root.descendant(&path.steps)
    }

    fn node_mut(&mut self, path: &VarPath) -> Option<&mut ValueNode> {
        let root = match path.root {
            VarRoot::Arg(idx) => self.locals.data_mut().args.get_mut(idx),
            VarRoot::Local(idx) => self.locals.data_mut().locals.get_mut(idx),
            VarRoot::Global(idx) => self.globals.data_mut().get_mut(idx),
        }?;
        root.descendant_mut(&path.steps)
    }

    fn owner_epoch(&self, root: VarRoot) -> u64 {
        match root {
            VarRoot::Arg(_) | VarRoot::Local(_) => self.locals.epoch(),
            VarRoot::Global(_) => self.globals.epoch(),
        }
    }

    /// Fetches more of the node at `path`: further slice elements or map
    /// pairs, or the fields of a struct that came back empty.
    ///
    /// Returns `false` when nothing was started, because the node needs no
    /// fetch or another expansion is already in flight.
    pub fn load_more(&mut self, path: &VarPath) -> bool {
        if self.session.running {
            return false;
        }
        let Some(backend) = self.backend.clone() else {
            return false;
        };
        let Some(plan) = self.node(path).and_then(ExpandPlan::for_node) else {
            self.settle_unaddressable(path);
            return false;
        };
        let Some(permit) = self.expander.try_acquire() else {
            debug!(event = "expand_busy", expr = %plan.expr);
            return false;
        };

        let epoch = self.owner_epoch(path.root);
        let scope = self.session.scope();
        let load = self.config.load;
        let timeout = self.config.backend_timeout;
        let tx = self.tx.clone();
        let path = path.clone();
        debug!(event = "expand_start", expr = %plan.expr, offset = plan.offset);
        tokio::spawn(async move {
            let expr = plan.expr.clone();
            let call = move || backend.eval_variable(scope, &expr, load).map(ValueNode::from);
            let result = run_blocking(timeout, call).await.and_then(|fetched| fetched);
            // Released before the update lands so the next render may expand.
            drop(permit);
            let _ = tx.send(Update::Expanded {
                path,
                plan,
                epoch,
                result,
            });
        });
        true
    }

    /// A struct that came back without fields and without an address cannot
    /// be reloaded; mark it unreadable so the view stops showing it as
    /// loading.
    fn settle_unaddressable(&mut self, path: &VarPath) {
        let Some(node) = self.node_mut(path) else {
            return;
        };
        if !node.is_lazy_struct() || node.unreadable.is_some() {
            return;
        }
        let line = format!("Error loading struct contents {}: no address", node.name);
        node.unreadable = Some("no address".to_string());
        node.pin_length();
        warn!(event = "expand_error", error = %line);
        self.log(line);
    }

    pub fn is_expanding(&self) -> bool {
        self.expander.is_running()
    }

    /// Makes `id` the current goroutine. Ignored while the target runs.
    pub fn select_goroutine(&mut self, id: i64) -> bool {
        self.switch(id, "Could not switch goroutine", |backend, id| {
            backend.switch_goroutine(id)
        })
    }

    pub fn select_thread(&mut self, id: i64) -> bool {
        self.switch(id, "Could not switch thread", |backend, id| backend.switch_thread(id))
    }

    fn switch(
        &mut self,
        id: i64,
        context: &'static str,
        call: fn(&dyn Backend, i64) -> Result<DebuggerState, BackendError>,
    ) -> bool {
        if self.session.running {
            return false;
        }
        let Some(backend) = self.backend.clone() else {
            return false;
        };
        let timeout = self.config.backend_timeout;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = run_blocking(timeout, move || call(backend.as_ref(), id))
                .await
                .and_then(|state| state);
            let update = match result {
                Ok(state) => Update::Switched {
                    state,
                    reason: InvalidateReason::GoroutineSwitch,
                },
                Err(err) => {
                    warn!(event = "switch_error", id, error = %err);
                    Update::Log(format!("{context}: {err}"))
                }
            };
            let _ = tx.send(update);
        });
        true
    }

    pub fn select_frame(&mut self, frame: usize) -> bool {
        if self.session.running {
            return false;
        }
        if self.session.frame != frame {
            self.session.frame = frame;
            self.invalidate(InvalidateReason::FrameSwitch);
        }
        true
    }

    pub fn set_stack_depth(&mut self, depth: usize) {
        let depth = clamp_stack_depth(depth);
        if depth != self.config.stack_depth {
            self.config.stack_depth = depth;
            self.clear(PanelKind::Stack);
        }
    }

    pub fn clear_breakpoint(&mut self, id: i64) -> bool {
        self.breakpoint_command(move |backend| {
            backend
                .clear_breakpoint(id)
                .err()
                .map(|err| format!("Could not clear breakpoint {id}: {err}"))
                .into_iter()
                .collect()
        })
    }

    /// Clears every user breakpoint. Internal breakpoints (negative IDs) are
    /// left alone.
    pub fn clear_all_breakpoints(&mut self) -> bool {
        let ids: Vec<i64> = self
            .breakpoints
            .data()
            .iter()
            .filter(|bp| !bp.is_internal())
            .map(|bp| bp.id)
            .collect();
        self.breakpoint_command(move |backend| {
            ids.into_iter()
                .filter_map(|id| {
                    backend
                        .clear_breakpoint(id)
                        .err()
                        .map(|err| format!("Could not clear breakpoint {id}: {err}"))
                })
                .collect()
        })
    }

    pub fn amend_breakpoint(&mut self, breakpoint: Breakpoint) -> bool {
        self.breakpoint_command(move |backend| {
            backend
                .amend_breakpoint(&breakpoint)
                .err()
                .map(|err| format!("Could not amend breakpoint {}: {err}", breakpoint.id))
                .into_iter()
                .collect()
        })
    }

    /// Runs a breakpoint mutation, logs whatever failed and then refreshes
    /// the breakpoints panel.
    fn breakpoint_command<F>(&mut self, command: F) -> bool
    where
        F: FnOnce(&dyn Backend) -> Vec<String> + Send + 'static,
    {
        let Some(backend) = self.backend.clone() else {
            return false;
        };
        let timeout = self.config.backend_timeout;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let failures = match run_blocking(timeout, move || command(backend.as_ref())).await {
                Ok(failures) => failures,
                Err(err) => vec![format!("Breakpoint command failed: {err}")],
            };
            for line in &failures {
                warn!(event = "breakpoint_command_error", error = %line);
            }
            let _ = tx.send(Update::Refresh {
                log: failures,
                panels: &[PanelKind::Breakpoints],
            });
        });
        true
    }

    pub fn set_locals_filter(&mut self, filter: &str) {
        self.locals_filter = sanitize_filter(filter);
    }

    pub fn set_globals_filter(&mut self, filter: &str) {
        self.globals_filter = sanitize_filter(filter);
    }

    pub fn toggle_show_address(&mut self) {
        self.show_address = !self.show_address;
    }

    pub fn show_address(&self) -> bool {
        self.show_address
    }

    pub fn goroutine_location(&self) -> GoroutineLocation {
        self.goroutine_location
    }

    pub fn cycle_goroutine_location(&mut self) {
        self.goroutine_location = self.goroutine_location.next();
    }

    pub fn console(&self) -> &VecDeque<String> {
        &self.console
    }

    pub fn log(&mut self, line: impl Into<String>) {
        self.console.push_back(line.into());
        while self.console.len() > self.config.console_capacity {
            self.console.pop_front();
        }
    }

    /// Applies every update that has already arrived. Returns how many were
    /// applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(update) = self.rx.try_recv() {
            self.apply(update);
            applied += 1;
        }
        applied
    }

    /// Waits for the next update, then applies it and anything queued
    /// behind it.
    pub async fn changed(&mut self) -> usize {
        match self.rx.recv().await {
            Some(update) => {
                self.apply(update);
                1 + self.pump()
            }
            None => 0,
        }
    }

    fn apply(&mut self, update: Update) {
        match update {
            Update::Loaded { ticket, result } => self.apply_load(ticket, result),
            Update::Expanded {
                path,
                plan,
                epoch,
                result,
            } => self.apply_expansion(path, plan, epoch, result),
            Update::Switched { state, reason } => {
                self.apply_state(&state);
                self.session.frame = 0;
                self.invalidate(reason);
            }
            Update::Refresh { log, panels } => {
                for line in log {
                    self.log(line);
                }
                for &kind in panels {
                    self.clear(kind);
                }
            }
            Update::Log(line) => self.log(line),
        }
    }

    fn apply_state(&mut self, state: &DebuggerState) {
        if let Some(id) = state.current_goroutine_id {
            self.session.goroutine_id = id;
        }
        self.session.thread_id = state.current_thread_id;
    }

    fn apply_load(&mut self, ticket: LoadTicket, result: Result<PanelData, LoadError>) {
        let data = match result {
            Ok(data) => Some(data),
            Err(err) => {
                if matches!(err.source, BackendError::Timeout(_)) {
                    warn!(event = "panel_load_timeout", panel = %ticket.panel, error = %err);
                } else {
                    warn!(event = "panel_load_error", panel = %ticket.panel, error = %err);
                }
                self.log(err.to_string());
                None
            }
        };
        let completion = match data {
            Some(PanelData::Goroutines(data)) => self.goroutines.complete(ticket.epoch, Some(data)),
            Some(PanelData::Stack(data)) => self.stack.complete(ticket.epoch, Some(data)),
            Some(PanelData::Threads(data)) => self.threads.complete(ticket.epoch, Some(data)),
            Some(PanelData::Locals(data)) => self.locals.complete(ticket.epoch, Some(data)),
            Some(PanelData::Registers(data)) => self.registers.complete(ticket.epoch, Some(data)),
            Some(PanelData::Globals(data)) => self.globals.complete(ticket.epoch, Some(data)),
            Some(PanelData::Breakpoints(data)) => {
                self.breakpoints.complete(ticket.epoch, Some(data))
            }
            None => self.panel_mut(ticket.panel).fail(ticket.epoch),
        };
        if completion == Completion::Stale {
            debug!(event = "stale_result_dropped", panel = %ticket.panel, epoch = ticket.epoch);
        }
    }

    fn apply_expansion(
        &mut self,
        path: VarPath,
        plan: ExpandPlan,
        epoch: u64,
        result: Result<ValueNode, BackendError>,
    ) {
        if self.owner_epoch(path.root) != epoch {
            debug!(event = "stale_result_dropped", expr = %plan.expr);
            return;
        }
        let Some(node) = self.node_mut(&path) else {
            debug!(event = "stale_result_dropped", expr = %plan.expr);
            return;
        };
        if !plan.still_applies(node) {
            debug!(event = "stale_result_dropped", expr = %plan.expr);
            return;
        }
        if let Some(line) = plan.apply(node, result) {
            warn!(event = "expand_error", error = %line);
            self.log(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expander::ExpandKind;
    use crate::testing::{int_var, map_var, slice_var, struct_var, MockBackend};
    use crate::view::{VarRow, VarRowKind};
    use std::collections::HashSet;
    use std::time::Duration;

    fn attached(backend: &Arc<MockBackend>) -> Inspector {
        attached_with(backend, InspectorConfig::default())
    }

    fn attached_with(backend: &Arc<MockBackend>, config: InspectorConfig) -> Inspector {
        let mut inspector = Inspector::new(config);
        let state = DebuggerState {
            current_goroutine_id: Some(1),
            ..DebuggerState::default()
        };
        inspector.attach(Arc::clone(backend) as Arc<dyn Backend>, state);
        inspector
    }

    async fn settle(inspector: &mut Inspector) {
        tokio::time::timeout(Duration::from_secs(5), inspector.changed())
            .await
            .expect("update within deadline");
    }

    fn texts(view: &VarView) -> Vec<String> {
        view.rows.iter().map(VarRow::text).collect()
    }

    async fn loaded_locals(inspector: &mut Inspector) {
        let expanded: HashSet<VarPath> = HashSet::new();
        assert!(inspector.locals_view(&expanded).ready().is_none());
        settle(inspector).await;
        assert!(inspector.is_loaded(PanelKind::Locals));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn placeholders_before_attach_and_while_running() {
        let mut inspector = Inspector::new(InspectorConfig::default());
        assert_eq!(
            inspector.goroutines_view(),
            PanelView::Placeholder(Placeholder::Connecting)
        );

        let backend = Arc::new(MockBackend::default());
        let mut inspector = attached(&backend);
        inspector.set_running(true);
        assert_eq!(
            inspector.threads_view(),
            PanelView::Placeholder(Placeholder::Running)
        );
        assert!(!inspector.select_goroutine(3));
        assert_eq!(backend.calls("list_threads"), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn each_panel_loads_once_per_invalidation() {
        let backend = Arc::new(MockBackend::default());
        backend.set_goroutines(&[7, 2, 5]);
        let mut inspector = attached(&backend);

        for _ in 0..10 {
            assert_eq!(
                inspector.goroutines_view(),
                PanelView::Placeholder(Placeholder::Loading)
            );
        }
        settle(&mut inspector).await;
        let ids: Vec<i64> = inspector
            .goroutines_view()
            .ready()
            .expect("loaded")
            .iter()
            .map(|g| g.id)
            .collect();
        assert_eq!(ids, vec![2, 5, 7]);
        assert_eq!(backend.calls("list_goroutines"), 1);

        inspector.set_running(false);
        assert!(!inspector.is_loaded(PanelKind::Goroutines));
        assert!(inspector.goroutines_view().ready().is_none());
        settle(&mut inspector).await;
        assert_eq!(backend.calls("list_goroutines"), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failed_load_completes_and_logs() {
        let backend = Arc::new(MockBackend::default());
        backend.fail("list_breakpoints");
        let mut inspector = attached(&backend);
        assert!(inspector.breakpoints_view().ready().is_none());
        settle(&mut inspector).await;

        assert!(!inspector.is_loading(PanelKind::Breakpoints));
        assert_eq!(inspector.breakpoints_view(), PanelView::Ready(&[][..]));
        assert_eq!(
            inspector.console().back().map(String::as_str),
            Some("Could not list breakpoints: boom")
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn result_started_before_clear_is_dropped() {
        let backend = Arc::new(MockBackend::default());
        backend.set_stack(3);
        let mut inspector = attached(&backend);

        assert!(inspector.stack_view().ready().is_none());
        inspector.clear(PanelKind::Stack);
        assert!(inspector.is_loading(PanelKind::Stack));
        settle(&mut inspector).await;

        assert!(!inspector.is_loading(PanelKind::Stack));
        assert!(!inspector.is_loaded(PanelKind::Stack));
        assert!(inspector.stack_view().ready().is_none());
        settle(&mut inspector).await;
        assert_eq!(inspector.stack_view().ready().map(<[_]>::len), Some(3));
        assert_eq!(backend.calls("stacktrace"), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stack_depth_change_reloads_with_new_depth() {
        let backend = Arc::new(MockBackend::default());
        backend.set_stack(10);
        let mut inspector = attached(&backend);
        inspector.stack_view();
        settle(&mut inspector).await;

        inspector.set_stack_depth(4);
        assert!(!inspector.is_loaded(PanelKind::Stack));
        inspector.stack_view();
        settle(&mut inspector).await;
        assert_eq!(backend.last_stack_request(), Some((1, 4)));
        assert_eq!(inspector.stack_view().ready().map(<[_]>::len), Some(4));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn lazy_struct_reloads_once_when_opened() {
        let backend = Arc::new(MockBackend::default());
        backend.set_locals(vec![struct_var("cfg", 0xc000_3000, 2, Vec::new())]);
        backend.respond(
            "*(*\"main.Config\")(0xc0003000)",
            struct_var("", 0xc000_3000, 2, vec![int_var("A", "1"), int_var("B", "2")]),
        );
        let mut inspector = attached(&backend);
        loaded_locals(&mut inspector).await;

        let root = VarPath::new(VarRoot::Local(0));
        let expanded = HashSet::from([root.clone()]);
        backend.hold_evals();
        for _ in 0..3 {
            let view = inspector.locals_view(&expanded).ready().expect("loaded");
            assert_eq!(texts(&view), vec!["cfg main.Config", "Loading..."]);
        }
        assert!(inspector.is_expanding());
        backend.release_evals();
        settle(&mut inspector).await;

        let view = inspector.locals_view(&expanded).ready().expect("loaded");
        assert_eq!(
            texts(&view),
            vec!["cfg main.Config", "A int = 1", "B int = 2"]
        );
        assert_eq!(backend.calls("eval_variable"), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn struct_without_address_turns_unreadable() {
        let backend = Arc::new(MockBackend::default());
        backend.set_locals(vec![struct_var("cfg", 0, 3, Vec::new())]);
        let mut inspector = attached(&backend);
        loaded_locals(&mut inspector).await;

        let expanded = HashSet::from([VarPath::new(VarRoot::Local(0))]);
        let view = inspector.locals_view(&expanded).ready().expect("loaded");
        assert_eq!(texts(&view), vec!["cfg main.Config", "Loading..."]);
        for _ in 0..3 {
            let view = inspector.locals_view(&expanded).ready().expect("loaded");
            assert_eq!(texts(&view), vec!["cfg main.Config = (unreadable no address)"]);
        }
        assert_eq!(backend.calls("eval_variable"), 0);
        assert_eq!(
            inspector.console().back().map(String::as_str),
            Some("Error loading struct contents cfg: no address")
        );
        assert_eq!(inspector.console().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn fieldless_struct_reload_is_not_repeated() {
        let backend = Arc::new(MockBackend::default());
        backend.set_locals(vec![struct_var("cfg", 0xc000_3000, 2, Vec::new())]);
        backend.respond(
            "*(*\"main.Config\")(0xc0003000)",
            struct_var("", 0xc000_3000, 2, Vec::new()),
        );
        let mut inspector = attached(&backend);
        loaded_locals(&mut inspector).await;

        let expanded = HashSet::from([VarPath::new(VarRoot::Local(0))]);
        inspector.locals_view(&expanded);
        settle(&mut inspector).await;
        for _ in 0..5 {
            let view = inspector.locals_view(&expanded).ready().expect("loaded");
            assert_eq!(texts(&view), vec!["cfg main.Config"]);
        }
        assert_eq!(backend.calls("eval_variable"), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failed_struct_reload_renders_unreadable() {
        let backend = Arc::new(MockBackend::default());
        backend.set_locals(vec![struct_var("cfg", 0xc000_3000, 2, Vec::new())]);
        backend.fail("eval_variable");
        let mut inspector = attached(&backend);
        loaded_locals(&mut inspector).await;

        let root = VarPath::new(VarRoot::Local(0));
        let expanded = HashSet::from([root.clone()]);
        let view = inspector.locals_view(&expanded).ready().expect("loaded");
        assert_eq!(texts(&view), vec!["cfg main.Config", "Loading..."]);
        settle(&mut inspector).await;

        assert_eq!(
            inspector.console().back().map(String::as_str),
            Some("Error loading struct contents *(*\"main.Config\")(0xc0003000): boom")
        );
        for _ in 0..3 {
            let view = inspector.locals_view(&expanded).ready().expect("loaded");
            assert_eq!(texts(&view), vec!["cfg main.Config = (unreadable boom)"]);
        }
        assert_eq!(backend.calls("eval_variable"), 1);
        assert!(!inspector.load_more(&root));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn guard_is_free_once_the_expansion_lands() {
        let backend = Arc::new(MockBackend::default());
        backend.set_locals(vec![
            slice_var("a", 0xc000_1000, 4, &["1", "2"]),
            slice_var("b", 0xc000_5000, 4, &["1"]),
        ]);
        backend.respond(
            "(*(*\"[]int\")(0xc0001000))[2:]",
            slice_var("", 0xc000_1000, 2, &["3", "4"]),
        );
        let mut inspector = attached(&backend);
        loaded_locals(&mut inspector).await;

        assert!(inspector.load_more(&VarPath::new(VarRoot::Local(0))));
        settle(&mut inspector).await;
        assert!(!inspector.is_expanding());
        assert!(inspector.load_more(&VarPath::new(VarRoot::Local(1))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn more_pairs_then_exhausted() {
        let backend = Arc::new(MockBackend::default());
        backend.set_locals(vec![map_var(
            "m",
            0xc000_2000,
            10,
            &[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")],
        )]);
        backend.respond(
            "(*(*\"map[string]int\")(0xc0002000))[4:]",
            map_var(
                "",
                0xc000_2000,
                10,
                &[("e", "5"), ("f", "6"), ("g", "7"), ("h", "8"), ("i", "9"), ("j", "10")],
            ),
        );
        let mut inspector = attached(&backend);
        loaded_locals(&mut inspector).await;

        let root = VarPath::new(VarRoot::Local(0));
        let expanded = HashSet::from([root.clone()]);
        let view = inspector.locals_view(&expanded).ready().expect("loaded");
        let more = view.rows.last().expect("more row");
        assert_eq!(
            more.kind,
            VarRowKind::More {
                remaining: 6,
                action: Some(ExpandKind::MorePairs)
            }
        );

        assert!(inspector.load_more(&more.path));
        settle(&mut inspector).await;
        let view = inspector.locals_view(&expanded).ready().expect("loaded");
        assert_eq!(view.rows.len(), 11);
        assert!(view
            .rows
            .iter()
            .all(|row| !matches!(row.kind, VarRowKind::More { .. })));
        assert!(!inspector.load_more(&root));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn only_one_expansion_in_flight() {
        let backend = Arc::new(MockBackend::default());
        backend.set_locals(vec![
            slice_var("a", 0xc000_1000, 4, &["1", "2"]),
            slice_var("b", 0xc000_5000, 4, &["1"]),
        ]);
        backend.respond(
            "(*(*\"[]int\")(0xc0001000))[2:]",
            slice_var("", 0xc000_1000, 2, &["3", "4"]),
        );
        let mut inspector = attached(&backend);
        loaded_locals(&mut inspector).await;

        backend.hold_evals();
        let first = VarPath::new(VarRoot::Local(0));
        let second = VarPath::new(VarRoot::Local(1));
        assert!(inspector.load_more(&first));
        assert!(!inspector.load_more(&first));
        assert!(!inspector.load_more(&second));
        backend.release_evals();
        settle(&mut inspector).await;

        let node = inspector.node(&first).expect("node");
        assert_eq!(node.remaining(), 0);
        assert_eq!(backend.eval_exprs(), vec!["(*(*\"[]int\")(0xc0001000))[2:]"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn expansion_after_frame_switch_is_dropped() {
        let backend = Arc::new(MockBackend::default());
        backend.set_locals(vec![slice_var("a", 0xc000_1000, 4, &["1", "2"])]);
        backend.respond(
            "(*(*\"[]int\")(0xc0001000))[2:]",
            slice_var("", 0xc000_1000, 2, &["3", "4"]),
        );
        let mut inspector = attached(&backend);
        loaded_locals(&mut inspector).await;

        backend.hold_evals();
        let path = VarPath::new(VarRoot::Local(0));
        assert!(inspector.load_more(&path));
        assert!(inspector.select_frame(1));
        backend.release_evals();
        settle(&mut inspector).await;

        assert_eq!(inspector.node(&path).map(ValueNode::materialized), Some(2));
        assert!(inspector.console().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failed_expansion_logs_and_stops_offering_more() {
        let backend = Arc::new(MockBackend::default());
        backend.set_locals(vec![slice_var("a", 0xc000_1000, 4, &["1", "2"])]);
        let mut inspector = attached(&backend);
        loaded_locals(&mut inspector).await;

        backend.fail("eval_variable");
        let path = VarPath::new(VarRoot::Local(0));
        assert!(inspector.load_more(&path));
        settle(&mut inspector).await;

        assert_eq!(
            inspector.console().back().map(String::as_str),
            Some("Error loading array contents (*(*\"[]int\")(0xc0001000))[2:]: boom")
        );
        assert_eq!(inspector.node(&path).map(ValueNode::remaining), Some(0));
        assert!(!inspector.load_more(&path));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn timed_out_expansion_releases_the_guard() {
        let backend = Arc::new(MockBackend::default());
        backend.set_locals(vec![slice_var("a", 0xc000_1000, 4, &["1", "2"])]);
        let config = InspectorConfig {
            backend_timeout: Some(Duration::from_millis(50)),
            ..InspectorConfig::default()
        };
        let mut inspector = attached_with(&backend, config);
        loaded_locals(&mut inspector).await;

        backend.hold_evals();
        assert!(inspector.load_more(&VarPath::new(VarRoot::Local(0))));
        settle(&mut inspector).await;
        backend.release_evals();

        let line = inspector.console().back().cloned().unwrap_or_default();
        assert!(line.starts_with("Error loading array contents"), "{line}");
        assert!(line.ends_with("timed out after 50ms"), "{line}");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!inspector.is_expanding());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn goroutine_switch_updates_scope_and_refreshes() {
        let backend = Arc::new(MockBackend::default());
        backend.set_goroutines(&[1, 7]);
        let mut inspector = attached(&backend);
        inspector.goroutines_view();
        settle(&mut inspector).await;
        assert!(inspector.select_frame(2));

        backend.set_switch_state(DebuggerState {
            current_goroutine_id: Some(7),
            current_thread_id: Some(3),
            ..DebuggerState::default()
        });
        assert!(inspector.select_goroutine(7));
        settle(&mut inspector).await;

        let session = inspector.session();
        assert_eq!(session.goroutine_id, 7);
        assert_eq!(session.thread_id, Some(3));
        assert_eq!(session.frame, 0);
        assert!(!inspector.is_loaded(PanelKind::Goroutines));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn switch_failure_is_logged() {
        let backend = Arc::new(MockBackend::default());
        backend.fail("switch_thread");
        let mut inspector = attached(&backend);
        assert!(inspector.select_thread(4));
        settle(&mut inspector).await;
        assert_eq!(
            inspector.console().back().map(String::as_str),
            Some("Could not switch thread: boom")
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn clear_all_skips_internal_breakpoints() {
        let backend = Arc::new(MockBackend::default());
        backend.set_breakpoints(&[3, -1, 2]);
        let mut inspector = attached(&backend);
        inspector.breakpoints_view();
        settle(&mut inspector).await;
        let ids: Vec<i64> = inspector
            .breakpoints_view()
            .ready()
            .expect("loaded")
            .iter()
            .map(|bp| bp.id)
            .collect();
        assert_eq!(ids, vec![-1, 2, 3]);

        assert!(inspector.clear_all_breakpoints());
        settle(&mut inspector).await;
        assert_eq!(backend.cleared(), vec![2, 3]);
        assert!(!inspector.is_loaded(PanelKind::Breakpoints));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn amend_failure_is_logged_and_panel_refreshed() {
        let backend = Arc::new(MockBackend::default());
        backend.set_breakpoints(&[1]);
        backend.fail("amend_breakpoint");
        let mut inspector = attached(&backend);
        inspector.breakpoints_view();
        settle(&mut inspector).await;

        let breakpoint = Breakpoint {
            id: 1,
            cond: "i > 3".to_string(),
            ..Breakpoint::default()
        };
        assert!(inspector.amend_breakpoint(breakpoint));
        settle(&mut inspector).await;
        assert_eq!(
            inspector.console().back().map(String::as_str),
            Some("Could not amend breakpoint 1: boom")
        );
        assert!(!inspector.is_loaded(PanelKind::Breakpoints));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn console_is_bounded() {
        let config = InspectorConfig {
            console_capacity: 2,
            ..InspectorConfig::default()
        };
        let mut inspector = Inspector::new(config);
        for line in ["a", "b", "c"] {
            inspector.log(line);
        }
        let lines: Vec<&str> = inspector.console().iter().map(String::as_str).collect();
        assert_eq!(lines, vec!["b", "c"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn locals_filter_and_separator() {
        let backend = Arc::new(MockBackend::default());
        backend.set_args(vec![int_var("n", "1")]);
        backend.set_locals(vec![int_var("total", "2"), int_var("count", "3")]);
        let mut inspector = attached(&backend);
        loaded_locals(&mut inspector).await;

        let expanded: HashSet<VarPath> = HashSet::new();
        let view = inspector.locals_view(&expanded).ready().expect("loaded");
        assert_eq!(
            texts(&view),
            vec!["n int = 1", "", "count int = 3", "total int = 2"]
        );

        inspector.set_locals_filter(" to ");
        let view = inspector.locals_view(&expanded).ready().expect("loaded");
        assert_eq!(texts(&view), vec!["total int = 2"]);
    }
}
