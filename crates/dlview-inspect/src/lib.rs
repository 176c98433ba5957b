//! Load state, background loading and value expansion for the debugger's
//! inspection panels.

pub mod backend;
pub mod config;
pub mod expander;
pub mod inspector;
pub mod loaders;
pub mod panel;
pub mod view;

#[cfg(test)]
mod testing;

pub use backend::{Backend, BackendError};
pub use config::InspectorConfig;
pub use expander::{ExpandKind, ExpandPlan, SingleFlightExpander, VarPath, VarRoot};
pub use inspector::{Inspector, InvalidateReason, PanelView, Session};
pub use loaders::{LoadError, LocalsData, PanelData};
pub use panel::{PanelKind, Placeholder};
pub use view::{ExpansionState, VarRow, VarRowKind, VarView};
