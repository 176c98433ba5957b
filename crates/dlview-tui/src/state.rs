use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use dlview_core::{Breakpoint, BreakpointEdit};
use dlview_inspect::{
    Inspector, PanelKind, PanelView, Placeholder, VarPath, VarRow, VarRowKind, VarView,
};
use ratatui::widgets::ListState;
use std::collections::HashSet;

pub const TABS: [PanelKind; 7] = PanelKind::ALL;

/// What pressing Enter on a list entry acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    None,
    Goroutine(i64),
    Thread(i64),
    Frame(usize),
    Var(VarRow),
    Breakpoint(Breakpoint),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub depth: usize,
    pub text: String,
    pub current: bool,
    pub target: Target,
}

impl Entry {
    fn plain(text: String, target: Target) -> Self {
        Self {
            depth: 0,
            text,
            current: false,
            target,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    Placeholder(Placeholder),
    Entries(Vec<Entry>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Filter,
}

pub struct App {
    pub inspector: Inspector,
    pub tab: usize,
    pub list_state: ListState,
    pub expanded: HashSet<VarPath>,
    pub listing: Listing,
    pub mode: Mode,
    pub filter: String,
    pub should_quit: bool,
}

impl App {
    pub fn new(inspector: Inspector) -> Self {
        let mut list_state = ListState::default();
        list_state.select(Some(0));
        Self {
            inspector,
            tab: 0,
            list_state,
            expanded: HashSet::new(),
            listing: Listing::Placeholder(Placeholder::Connecting),
            mode: Mode::Normal,
            filter: String::new(),
            should_quit: false,
        }
    }

    pub fn current_tab(&self) -> PanelKind {
        TABS[self.tab]
    }

    /// Rebuilds the visible listing. Polling the panel may start its load.
    pub fn refresh_listing(&mut self) {
        let listing = match self.current_tab() {
            PanelKind::Goroutines => self.goroutine_entries(),
            PanelKind::Stack => self.stack_entries(),
            PanelKind::Threads => self.thread_entries(),
            PanelKind::Locals => {
                let view = self.inspector.locals_view(&self.expanded);
                var_entries(view)
            }
            PanelKind::Registers => match self.inspector.registers_view() {
                PanelView::Placeholder(placeholder) => Listing::Placeholder(placeholder),
                PanelView::Ready(registers) => Listing::Entries(
                    registers
                        .lines()
                        .map(|line| Entry::plain(line.to_string(), Target::None))
                        .collect(),
                ),
            },
            PanelKind::Globals => {
                let view = self.inspector.globals_view(&self.expanded);
                var_entries(view)
            }
            PanelKind::Breakpoints => match self.inspector.breakpoints_view() {
                PanelView::Placeholder(placeholder) => Listing::Placeholder(placeholder),
                PanelView::Ready(breakpoints) => Listing::Entries(
                    breakpoints
                        .iter()
                        .map(|bp| {
                            let marker = if bp.tracepoint { "T" } else { "B" };
                            let text = format!("{marker} {}", bp.describe().replace('\n', " "));
                            Entry::plain(text, Target::Breakpoint(bp.clone()))
                        })
                        .collect(),
                ),
            },
        };
        self.listing = listing;
        self.clamp_selection();
    }

    fn goroutine_entries(&mut self) -> Listing {
        let current = self.inspector.session().goroutine_id;
        let location = self.inspector.goroutine_location();
        match self.inspector.goroutines_view() {
            PanelView::Placeholder(placeholder) => Listing::Placeholder(placeholder),
            PanelView::Ready(goroutines) => Listing::Entries(
                goroutines
                    .iter()
                    .map(|g| Entry {
                        depth: 0,
                        text: format!("Goroutine {} - {}", g.id, location.pick(g)),
                        current: g.id == current,
                        target: Target::Goroutine(g.id),
                    })
                    .collect(),
            ),
        }
    }

    fn stack_entries(&mut self) -> Listing {
        let frame = self.inspector.session().frame;
        match self.inspector.stack_view() {
            PanelView::Placeholder(placeholder) => Listing::Placeholder(placeholder),
            PanelView::Ready(frames) => Listing::Entries(
                frames
                    .iter()
                    .enumerate()
                    .map(|(idx, f)| Entry {
                        depth: 0,
                        text: format!("{idx:>2} {}", f.location),
                        current: idx == frame,
                        target: Target::Frame(idx),
                    })
                    .collect(),
            ),
        }
    }

    fn thread_entries(&mut self) -> Listing {
        let current = self.inspector.session().thread_id;
        match self.inspector.threads_view() {
            PanelView::Placeholder(placeholder) => Listing::Placeholder(placeholder),
            PanelView::Ready(threads) => Listing::Entries(
                threads
                    .iter()
                    .map(|t| Entry {
                        depth: 0,
                        text: format!("Thread {} at {:#x} {}", t.id, t.pc, t.location()),
                        current: Some(t.id) == current,
                        target: Target::Thread(t.id),
                    })
                    .collect(),
            ),
        }
    }

    fn entry_count(&self) -> usize {
        match &self.listing {
            Listing::Entries(entries) => entries.len(),
            Listing::Placeholder(_) => 0,
        }
    }

    fn clamp_selection(&mut self) {
        let count = self.entry_count();
        let selected = self.list_state.selected().unwrap_or(0);
        self.list_state
            .select(Some(selected.min(count.saturating_sub(1))));
    }

    pub fn selected_target(&self) -> Option<&Target> {
        let Listing::Entries(entries) = &self.listing else {
            return None;
        };
        entries
            .get(self.list_state.selected().unwrap_or(0))
            .map(|entry| &entry.target)
    }

    fn move_selection(&mut self, delta: isize) {
        let count = self.entry_count();
        if count == 0 {
            return;
        }
        let current = self.list_state.selected().unwrap_or(0) as isize;
        let next = (current + delta).clamp(0, count as isize - 1);
        self.list_state.select(Some(next as usize));
    }

    fn switch_tab(&mut self, forward: bool) {
        self.tab = if forward {
            (self.tab + 1) % TABS.len()
        } else {
            (self.tab + TABS.len() - 1) % TABS.len()
        };
        self.list_state.select(Some(0));
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if self.mode == Mode::Filter {
            self.handle_filter_key(key);
            return;
        }
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true
            }
            KeyCode::Tab => self.switch_tab(true),
            KeyCode::BackTab => self.switch_tab(false),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Enter | KeyCode::Char(' ') => self.activate(),
            KeyCode::Char('r') => self.inspector.clear(self.current_tab()),
            KeyCode::Char('a') => self.inspector.toggle_show_address(),
            KeyCode::Char('l') => self.inspector.cycle_goroutine_location(),
            KeyCode::Char('+') => {
                let depth = self.inspector.config().stack_depth;
                self.inspector.set_stack_depth(depth + 10);
            }
            KeyCode::Char('-') => {
                let depth = self.inspector.config().stack_depth;
                self.inspector.set_stack_depth(depth.saturating_sub(10));
            }
            KeyCode::Char('/') => {
                if matches!(self.current_tab(), PanelKind::Locals | PanelKind::Globals) {
                    self.mode = Mode::Filter;
                    self.filter.clear();
                    self.apply_filter();
                }
            }
            KeyCode::Char('d') => {
                if let Some(Target::Breakpoint(bp)) = self.selected_target() {
                    let id = bp.id;
                    self.inspector.clear_breakpoint(id);
                }
            }
            KeyCode::Char('D') => {
                if self.current_tab() == PanelKind::Breakpoints {
                    self.inspector.clear_all_breakpoints();
                }
            }
            KeyCode::Char('t') => {
                if let Some(Target::Breakpoint(bp)) = self.selected_target() {
                    let mut amended = bp.clone();
                    let mut edit = BreakpointEdit::from_breakpoint(&amended);
                    edit.tracepoint = !edit.tracepoint;
                    edit.apply(&mut amended);
                    self.inspector.amend_breakpoint(amended);
                }
            }
            _ => {}
        }
    }

    fn handle_filter_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Enter => self.mode = Mode::Normal,
            KeyCode::Backspace => {
                self.filter.pop();
            }
            KeyCode::Char(ch) => self.filter.push(ch),
            _ => {}
        }
        self.apply_filter();
    }

    fn apply_filter(&mut self) {
        match self.current_tab() {
            PanelKind::Locals => self.inspector.set_locals_filter(&self.filter),
            PanelKind::Globals => self.inspector.set_globals_filter(&self.filter),
            _ => {}
        }
    }

    fn activate(&mut self) {
        let Some(target) = self.selected_target().cloned() else {
            return;
        };
        match target {
            Target::Goroutine(id) => {
                self.inspector.select_goroutine(id);
            }
            Target::Thread(id) => {
                self.inspector.select_thread(id);
            }
            Target::Frame(frame) => {
                self.inspector.select_frame(frame);
            }
            Target::Var(row) => match row.kind {
                VarRowKind::Branch { .. } => {
                    if !self.expanded.remove(&row.path) {
                        self.expanded.insert(row.path);
                    }
                }
                VarRowKind::More {
                    action: Some(_), ..
                } => {
                    self.inspector.load_more(&row.path);
                }
                _ => {}
            },
            Target::Breakpoint(_) | Target::None => {}
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }
}

fn var_entries(view: PanelView<VarView>) -> Listing {
    match view {
        PanelView::Placeholder(placeholder) => Listing::Placeholder(placeholder),
        PanelView::Ready(view) => Listing::Entries(
            view.rows
                .into_iter()
                .map(|row| Entry {
                    depth: row.depth,
                    text: row.text(),
                    current: false,
                    target: Target::Var(row),
                })
                .collect(),
        ),
    }
}
