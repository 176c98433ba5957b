//! Maps value trees to display rows.
//!
//! Rendering is pure apart from one side channel: a struct that is expanded
//! while still missing its fields is recorded in [`VarView::pending`] so the
//! caller can reload it.

use crate::expander::{ExpandKind, VarPath, VarRoot};
use dlview_core::listing::matches_filter;
use dlview_core::{Body, Kind, PointerTarget, ValueNode};
use std::collections::HashSet;

/// Map keys shorter than this render inline as `[key] = value`.
const MIN_INLINE_KEY_VALUE_LEN: usize = 20;

/// Expand/collapse state, owned by the rendering consumer.
pub trait ExpansionState {
    fn is_expanded(&self, path: &VarPath) -> bool;
}

impl ExpansionState for HashSet<VarPath> {
    fn is_expanded(&self, path: &VarPath) -> bool {
        self.contains(path)
    }
}

#[derive(Clone, Copy)]
pub struct RowContext<'a> {
    pub show_address: bool,
    pub expanded: &'a dyn ExpansionState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarRowKind {
    /// `name = value`
    Value(String),
    /// Collapsible header of a composite.
    Branch { label: String, expanded: bool },
    /// Informational line inside an expanded composite.
    Note(String),
    /// `N more`; `action` is `None` where paging is not offered.
    More {
        remaining: u64,
        action: Option<ExpandKind>,
    },
    /// Gap between function arguments and locals.
    Separator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarRow {
    pub depth: usize,
    /// Node this row belongs to. `More` rows point at the node to extend.
    pub path: VarPath,
    pub kind: VarRowKind,
}

impl VarRow {
    pub fn text(&self) -> String {
        match &self.kind {
            VarRowKind::Value(text) | VarRowKind::Note(text) => text.clone(),
            VarRowKind::Branch { label, .. } => label.clone(),
            VarRowKind::More { remaining, .. } => format!("{remaining} more"),
            VarRowKind::Separator => String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VarView {
    pub rows: Vec<VarRow>,
    /// Lazily loaded structs that were opened and need a reload.
    pub pending: Vec<VarPath>,
}

impl VarView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders every top-level variable whose name contains `filter`.
    pub fn render_list(
        &mut self,
        vars: &[ValueNode],
        root: fn(usize) -> VarRoot,
        filter: &str,
        ctx: RowContext<'_>,
    ) {
        for (idx, var) in vars.iter().enumerate() {
            if matches_filter(&var.name, filter) {
                self.render(var, &var.name, VarPath::new(root(idx)), ctx);
            }
        }
    }

    pub fn separator(&mut self, path: VarPath) {
        self.rows.push(VarRow {
            depth: 0,
            path,
            kind: VarRowKind::Separator,
        });
    }

    pub fn render(&mut self, node: &ValueNode, name: &str, path: VarPath, ctx: RowContext<'_>) {
        self.show(node, 0, name, path, ctx);
    }

    fn push(&mut self, depth: usize, path: &VarPath, kind: VarRowKind) {
        self.rows.push(VarRow {
            depth,
            path: path.clone(),
            kind,
        });
    }

    fn value(&mut self, depth: usize, path: &VarPath, text: String) {
        self.push(depth, path, VarRowKind::Value(text));
    }

    /// Pushes a branch header and reports whether its contents are shown.
    fn branch(&mut self, depth: usize, path: &VarPath, label: String, ctx: RowContext<'_>) -> bool {
        let expanded = ctx.expanded.is_expanded(path);
        self.push(depth, path, VarRowKind::Branch { label, expanded });
        expanded
    }

    fn show(&mut self, node: &ValueNode, depth: usize, name: &str, path: VarPath, ctx: RowContext<'_>) {
        let label = header(node, name, ctx.show_address);

        if let Some(reason) = &node.unreadable {
            self.value(depth, &path, format!("{label} = (unreadable {reason})"));
            return;
        }
        if depth > 0 && node.addr == 0 {
            self.value(depth, &path, format!("{label} = nil"));
            return;
        }

        match &node.body {
            Body::Slice { len, cap, elems } => {
                if self.branch(depth, &path, label, ctx) {
                    self.push(depth + 1, &path, VarRowKind::Note(format!("len: {len} cap: {cap}")));
                    self.elements(node, elems, depth, &path, ctx);
                }
            }
            Body::Array { len, elems } => {
                if self.branch(depth, &path, label, ctx) {
                    self.push(depth + 1, &path, VarRowKind::Note(format!("len: {len}")));
                    self.elements(node, elems, depth, &path, ctx);
                }
            }
            Body::Pointer(PointerTarget::Nil) => self.value(depth, &path, format!("{label} = nil")),
            Body::Pointer(PointerTarget::AddressOnly(addr)) => {
                let text = format!("{label} = ({})({addr:#x})", node.type_name);
                self.value(depth, &path, text);
            }
            Body::Pointer(PointerTarget::Value(target)) => {
                if self.branch(depth, &path, label, ctx) {
                    self.show(target, depth + 1, "", path.child(0), ctx);
                }
            }
            Body::UnsafePointer { target } => {
                self.value(depth, &path, format!("{label} = unsafe.Pointer({target:#x})"));
            }
            Body::String { text, .. } => {
                self.value(depth, &path, format!("{label} = {text:?}"));
                let remaining = node.remaining();
                if remaining > 0 {
                    self.push(
                        depth,
                        &path,
                        VarRowKind::More {
                            remaining,
                            action: None,
                        },
                    );
                }
            }
            Body::Channel { fields } => {
                if fields.is_empty() {
                    self.value(depth, &path, format!("{label} = nil"));
                } else if self.branch(depth, &path, label, ctx) {
                    self.fields(fields, depth, &path, ctx);
                }
            }
            Body::Struct { fields, .. } => {
                if self.branch(depth, &path, label, ctx) {
                    if node.is_lazy_struct() {
                        self.pending.push(path.clone());
                        self.push(depth + 1, &path, VarRowKind::Note("Loading...".to_string()));
                    } else {
                        self.fields(fields, depth, &path, ctx);
                    }
                }
            }
            Body::Interface { held: None } => self.value(depth, &path, format!("{label} = nil")),
            Body::Interface { held: Some(held) } => {
                if self.branch(depth, &path, label, ctx) {
                    let held_path = path.child(0);
                    match &held.body {
                        Body::Pointer(PointerTarget::Value(target)) => {
                            self.show(target, depth + 1, "data", held_path.child(0), ctx)
                        }
                        _ => self.show(held, depth + 1, "data", held_path, ctx),
                    }
                }
            }
            Body::Map { entries, .. } => {
                if self.branch(depth, &path, label, ctx) {
                    for (idx, entry) in entries.iter().enumerate() {
                        let key_text = entry.key.literal().unwrap_or("");
                        if !entry.key.has_children() && key_text.len() < MIN_INLINE_KEY_VALUE_LEN {
                            let key_name = if entry.key.kind == Kind::String {
                                format!("[{key_text:?}]")
                            } else {
                                format!("[{key_text}]")
                            };
                            self.show(&entry.value, depth + 1, &key_name, path.child(2 * idx + 1), ctx);
                        } else {
                            self.show(
                                &entry.key,
                                depth + 1,
                                &format!("[{idx} key]"),
                                path.child(2 * idx),
                                ctx,
                            );
                            self.show(
                                &entry.value,
                                depth + 1,
                                &format!("[{idx} value]"),
                                path.child(2 * idx + 1),
                                ctx,
                            );
                        }
                    }
                    self.more(node, depth, &path, ExpandKind::MorePairs);
                }
            }
            Body::Function { ident: None } => self.value(depth, &path, format!("{label} = nil")),
            Body::Function { ident: Some(ident) } => {
                self.value(depth, &path, format!("{label} = {ident}"));
            }
            Body::Complex { real, imag } => {
                self.value(depth, &path, format!("{label} = ({real} + {imag}i)"));
            }
            Body::Scalar { text: Some(text) } => self.value(depth, &path, format!("{label} = {text}")),
            Body::Scalar { text: None } => {
                self.value(depth, &path, format!("{label} = (unknown {})", node.kind));
            }
        }
    }

    fn elements(
        &mut self,
        node: &ValueNode,
        elems: &[ValueNode],
        depth: usize,
        path: &VarPath,
        ctx: RowContext<'_>,
    ) {
        for (idx, elem) in elems.iter().enumerate() {
            self.show(elem, depth + 1, &format!("[{idx}]"), path.child(idx), ctx);
        }
        self.more(node, depth, path, ExpandKind::MoreElements);
    }

    fn fields(&mut self, fields: &[ValueNode], depth: usize, path: &VarPath, ctx: RowContext<'_>) {
        for (idx, field) in fields.iter().enumerate() {
            self.show(field, depth + 1, &field.name, path.child(idx), ctx);
        }
    }

    fn more(&mut self, node: &ValueNode, depth: usize, path: &VarPath, action: ExpandKind) {
        let remaining = node.remaining();
        if remaining > 0 {
            self.push(
                depth + 1,
                path,
                VarRowKind::More {
                    remaining,
                    action: Some(action),
                },
            );
        }
    }
}

fn header(node: &ValueNode, name: &str, show_address: bool) -> String {
    let mut parts = Vec::with_capacity(3);
    let addr = format!("{:#x}", node.addr);
    if show_address {
        parts.push(addr.as_str());
    }
    if !name.is_empty() {
        parts.push(name);
    }
    if !node.type_name.is_empty() {
        parts.push(node.type_name.as_str());
    }
    parts.join(" ")
}
