//! Incremental loading of partially materialized values.
//!
//! One flag guards all three ways of asking for more of a value (more slice
//! elements, more map pairs, reloading a struct that came back without
//! fields). While a fetch is in flight every other request is dropped; the
//! view offers the same affordance again on the next tick.

use crate::backend::BackendError;
use dlview_core::{Body, ValueNode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpandKind {
    MoreElements,
    MorePairs,
    ReloadStruct,
}

/// Where a variable tree hangs off its panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarRoot {
    Arg(usize),
    Local(usize),
    Global(usize),
}

/// Address of one node inside a panel's variable trees.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VarPath {
    pub root: VarRoot,
    pub steps: Vec<usize>,
}

impl VarPath {
    pub fn new(root: VarRoot) -> Self {
        Self {
            root,
            steps: Vec::new(),
        }
    }

    pub fn child(&self, index: usize) -> Self {
        let mut steps = Vec::with_capacity(self.steps.len() + 1);
        steps.extend_from_slice(&self.steps);
        steps.push(index);
        Self {
            root: self.root,
            steps,
        }
    }
}

/// A planned fetch for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandPlan {
    pub kind: ExpandKind,
    pub expr: String,
    /// Materialized children when the fetch was planned.
    pub offset: usize,
}

impl ExpandPlan {
    /// Plans the fetch that would extend `node`, if it needs one.
    pub fn for_node(node: &ValueNode) -> Option<Self> {
        if node.unreadable.is_some() || node.addr == 0 {
            return None;
        }
        let kind = match &node.body {
            Body::Slice { .. } | Body::Array { .. } if node.remaining() > 0 => {
                ExpandKind::MoreElements
            }
            Body::Map { .. } if node.remaining() > 0 => ExpandKind::MorePairs,
            Body::Struct { .. } if node.is_lazy_struct() => ExpandKind::ReloadStruct,
            _ => return None,
        };
        let offset = node.materialized();
        let expr = match kind {
            ExpandKind::MoreElements | ExpandKind::MorePairs => format!(
                "(*(*{:?})({:#x}))[{}:]",
                node.type_name, node.addr, offset
            ),
            ExpandKind::ReloadStruct => format!("*(*{:?})({:#x})", node.type_name, node.addr),
        };
        Some(Self { kind, expr, offset })
    }

    /// Whether `node` is still in the state this plan was made for.
    pub fn still_applies(&self, node: &ValueNode) -> bool {
        match Self::for_node(node) {
            Some(current) => current.kind == self.kind && current.offset == self.offset,
            None => false,
        }
    }

    /// Merges a fetch result into `node`. Returns the line to log on failure.
    ///
    /// A failed fetch pins the node's length to what is already held so the
    /// "more" affordance goes away instead of retrying forever.
    pub fn apply(&self, node: &mut ValueNode, result: Result<ValueNode, BackendError>) -> Option<String> {
        match (self.kind, result) {
            (ExpandKind::ReloadStruct, Ok(fetched)) => {
                node.replace_with(fetched);
                // Still fieldless after a full reload: stop asking.
                if node.is_lazy_struct() {
                    node.pin_length();
                }
                None
            }
            (_, Ok(fetched)) => {
                if node.append_from(fetched) == 0 {
                    node.pin_length();
                }
                None
            }
            (ExpandKind::ReloadStruct, Err(err)) => {
                node.unreadable = Some(err.to_string());
                node.pin_length();
                Some(format!("Error loading struct contents {}: {err}", self.expr))
            }
            (_, Err(err)) => {
                node.pin_length();
                Some(format!("Error loading array contents {}: {err}", self.expr))
            }
        }
    }
}

/// Process-wide single-flight guard for expansion fetches.
#[derive(Debug, Clone, Default)]
pub struct SingleFlightExpander {
    running: Arc<AtomicBool>,
}

impl SingleFlightExpander {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<ExpandPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ExpandPermit {
                running: Arc::clone(&self.running),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Held by the one in-flight expansion; dropping it releases the guard.
#[derive(Debug)]
pub struct ExpandPermit {
    running: Arc<AtomicBool>,
}

impl Drop for ExpandPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}
