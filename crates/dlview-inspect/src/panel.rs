//! Per-view load state.
//!
//! A panel is `NotLoaded`, `Loading` or `Loaded`. A render tick on a
//! `NotLoaded` panel starts exactly one load; further ticks show a
//! placeholder until that load completes. `clear` bumps the panel epoch so a
//! load started before it cannot publish its result.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelKind {
    Goroutines,
    Stack,
    Threads,
    Locals,
    Registers,
    Globals,
    Breakpoints,
}

impl PanelKind {
    pub const ALL: [PanelKind; 7] = [
        PanelKind::Goroutines,
        PanelKind::Stack,
        PanelKind::Threads,
        PanelKind::Locals,
        PanelKind::Registers,
        PanelKind::Globals,
        PanelKind::Breakpoints,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PanelKind::Goroutines => "goroutines",
            PanelKind::Stack => "stacktrace",
            PanelKind::Threads => "threads",
            PanelKind::Locals => "locals",
            PanelKind::Registers => "regs",
            PanelKind::Globals => "globals",
            PanelKind::Breakpoints => "breakpoints",
        }
    }
}

impl fmt::Display for PanelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Connecting,
    Running,
    Loading,
}

impl Placeholder {
    pub fn label(self) -> &'static str {
        match self {
            Placeholder::Connecting => "Connecting...",
            Placeholder::Running => "Running...",
            Placeholder::Loading => "Loading...",
        }
    }
}

/// What a render tick sees of the target before touching a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub connected: bool,
    pub running: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    NotLoaded,
    /// A load started under `epoch` is in flight.
    Loading { epoch: u64 },
    Loaded,
}

/// Identifies one load run of one panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub panel: PanelKind,
    pub epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelPoll {
    Placeholder(Placeholder),
    /// The caller must launch the load for this ticket and show
    /// `Placeholder::Loading` for this tick.
    Start(LoadTicket),
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// The panel was cleared after this load started.
    Stale,
    /// No load with this ticket is in flight.
    Unknown,
}

#[derive(Debug)]
pub struct Panel<T> {
    kind: PanelKind,
    phase: LoadPhase,
    epoch: u64,
    data: T,
}

impl<T: Default> Panel<T> {
    pub fn new(kind: PanelKind) -> Self {
        Self {
            kind,
            phase: LoadPhase::NotLoaded,
            epoch: 0,
            data: T::default(),
        }
    }
}

impl<T> Panel<T> {
    pub fn kind(&self) -> PanelKind {
        self.kind
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, LoadPhase::Loading { .. })
    }

    /// Loaded and not cleared since. A panel whose in-flight load was
    /// cleared reports loading but not loaded.
    pub fn is_loaded(&self) -> bool {
        self.phase == LoadPhase::Loaded
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    pub fn poll(&mut self, readiness: Readiness) -> PanelPoll {
        match self.phase {
            LoadPhase::Loading { .. } => PanelPoll::Placeholder(Placeholder::Loading),
            LoadPhase::Loaded => PanelPoll::Ready,
            LoadPhase::NotLoaded => {
                if !readiness.connected {
                    return PanelPoll::Placeholder(Placeholder::Connecting);
                }
                if readiness.running {
                    return PanelPoll::Placeholder(Placeholder::Running);
                }
                self.phase = LoadPhase::Loading { epoch: self.epoch };
                PanelPoll::Start(LoadTicket {
                    panel: self.kind,
                    epoch: self.epoch,
                })
            }
        }
    }

    /// Forces the next tick to reload. A load in flight keeps the panel
    /// busy until it reports back, but its result is dropped.
    pub fn clear(&mut self) {
        self.epoch += 1;
        if self.phase == LoadPhase::Loaded {
            self.phase = LoadPhase::NotLoaded;
        }
    }

    /// Finishes a load. `data` is `None` when the fetch failed, in which case
    /// the previous data stays and the panel still counts as loaded.
    pub fn complete(&mut self, epoch: u64, data: Option<T>) -> Completion {
        let LoadPhase::Loading { epoch: started } = self.phase else {
            return Completion::Unknown;
        };
        if started != epoch {
            return Completion::Unknown;
        }
        if epoch != self.epoch {
            self.phase = LoadPhase::NotLoaded;
            return Completion::Stale;
        }
        if let Some(data) = data {
            self.data = data;
        }
        self.phase = LoadPhase::Loaded;
        Completion::Applied
    }
}

/// Type-erased handle so the inspector can drive every panel alike.
pub trait PanelState {
    fn kind(&self) -> PanelKind;
    fn poll(&mut self, readiness: Readiness) -> PanelPoll;
    fn clear(&mut self);
    fn fail(&mut self, epoch: u64) -> Completion;
    fn is_loading(&self) -> bool;
    fn is_loaded(&self) -> bool;
    fn epoch(&self) -> u64;
}

impl<T> PanelState for Panel<T> {
    fn kind(&self) -> PanelKind {
        Panel::kind(self)
    }

    fn poll(&mut self, readiness: Readiness) -> PanelPoll {
        Panel::poll(self, readiness)
    }

    fn clear(&mut self) {
        Panel::clear(self)
    }

    fn fail(&mut self, epoch: u64) -> Completion {
        self.complete(epoch, None)
    }

    fn is_loading(&self) -> bool {
        Panel::is_loading(self)
    }

    fn is_loaded(&self) -> bool {
        Panel::is_loaded(self)
    }

    fn epoch(&self) -> u64 {
        Panel::epoch(self)
    }
}
