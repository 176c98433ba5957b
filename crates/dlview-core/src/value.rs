//! Partially materialized runtime values.
//!
//! A [`ValueNode`] is built from a backend [`Variable`] and may hold fewer
//! children than its logical length says. The inspection layer extends such
//! nodes in place as more of the value is fetched.

use crate::{Kind, Variable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueNode {
    pub name: String,
    pub type_name: String,
    pub addr: u64,
    pub kind: Kind,
    /// Set when the backend could not read the value; rendering stops here.
    pub unreadable: Option<String>,
    pub body: Body,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Slice {
        len: i64,
        cap: i64,
        elems: Vec<ValueNode>,
    },
    Array {
        len: i64,
        elems: Vec<ValueNode>,
    },
    Pointer(PointerTarget),
    UnsafePointer {
        target: u64,
    },
    String {
        len: i64,
        text: String,
    },
    Channel {
        fields: Vec<ValueNode>,
    },
    Struct {
        len: i64,
        fields: Vec<ValueNode>,
    },
    Interface {
        held: Option<Box<ValueNode>>,
    },
    Map {
        len: i64,
        entries: Vec<MapEntry>,
    },
    Function {
        ident: Option<String>,
    },
    Complex {
        real: String,
        imag: String,
    },
    Scalar {
        text: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerTarget {
    Nil,
    /// The backend summarized the target without loading it.
    AddressOnly(u64),
    Value(Box<ValueNode>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    pub key: ValueNode,
    pub value: ValueNode,
}

impl From<Variable> for ValueNode {
    fn from(variable: Variable) -> Self {
        let Variable {
            name,
            addr,
            type_name,
            kind,
            value,
            len,
            cap,
            children,
            unreadable,
            ..
        } = variable;

        let body = match kind {
            Kind::Slice => Body::Slice {
                len,
                cap,
                elems: convert_all(children),
            },
            Kind::Array => Body::Array {
                len,
                elems: convert_all(children),
            },
            Kind::Ptr => Body::Pointer(pointer_target(&type_name, children)),
            Kind::UnsafePointer => Body::UnsafePointer {
                target: children.first().map(|child| child.addr).unwrap_or(0),
            },
            Kind::String => Body::String { len, text: value },
            Kind::Chan => Body::Channel {
                fields: convert_all(children),
            },
            Kind::Struct => Body::Struct {
                len,
                fields: convert_all(children),
            },
            Kind::Interface => Body::Interface {
                held: children
                    .into_iter()
                    .next()
                    .filter(|held| held.kind != Kind::Invalid)
                    .map(|held| Box::new(ValueNode::from(held))),
            },
            Kind::Map => Body::Map {
                len,
                entries: map_entries(children),
            },
            Kind::Func => Body::Function {
                ident: non_empty(value),
            },
            Kind::Complex64 | Kind::Complex128 => {
                let mut parts = children.into_iter().map(|part| part.value);
                Body::Complex {
                    real: parts.next().unwrap_or_default(),
                    imag: parts.next().unwrap_or_default(),
                }
            }
            _ => Body::Scalar {
                text: non_empty(value),
            },
        };

        ValueNode {
            name,
            type_name,
            addr,
            kind,
            unreadable: non_empty(unreadable),
            body,
        }
    }
}

fn convert_all(children: Vec<Variable>) -> Vec<ValueNode> {
    children.into_iter().map(ValueNode::from).collect()
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn pointer_target(type_name: &str, children: Vec<Variable>) -> PointerTarget {
    if type_name.is_empty() {
        return PointerTarget::Nil;
    }
    match children.into_iter().next() {
        None => PointerTarget::Nil,
        Some(target) if target.addr == 0 => PointerTarget::Nil,
        Some(target) if target.only_addr => PointerTarget::AddressOnly(target.addr),
        Some(target) => PointerTarget::Value(Box::new(ValueNode::from(target))),
    }
}

fn map_entries(children: Vec<Variable>) -> Vec<MapEntry> {
    let mut entries = Vec::with_capacity(children.len() / 2);
    let mut children = children.into_iter();
    while let (Some(key), Some(value)) = (children.next(), children.next()) {
        entries.push(MapEntry {
            key: key.into(),
            value: value.into(),
        });
    }
    entries
}

impl ValueNode {
    /// Literal text shown for leaf values (scalars, strings, functions).
    pub fn literal(&self) -> Option<&str> {
        match &self.body {
            Body::String { text, .. } => Some(text.as_str()),
            Body::Scalar { text } => text.as_deref(),
            Body::Function { ident } => ident.as_deref(),
            _ => None,
        }
    }

    /// Number of child nodes currently held, counting each map entry once.
    pub fn materialized(&self) -> usize {
        match &self.body {
            Body::Slice { elems, .. } | Body::Array { elems, .. } => elems.len(),
            Body::Struct { fields, .. } | Body::Channel { fields } => fields.len(),
            Body::Map { entries, .. } => entries.len(),
            Body::Pointer(PointerTarget::Value(_)) => 1,
            Body::Interface { held: Some(_) } => 1,
            Body::Complex { .. } => 2,
            _ => 0,
        }
    }

    pub fn has_children(&self) -> bool {
        self.materialized() > 0
    }

    /// Elements or pairs the backend reported but that are not loaded yet.
    ///
    /// Strings count bytes of the materialized prefix. Structs never report
    /// pending children here; see [`ValueNode::is_lazy_struct`].
    pub fn remaining(&self) -> u64 {
        let (len, held) = match &self.body {
            Body::Slice { len, elems, .. } | Body::Array { len, elems } => (*len, elems.len()),
            Body::Map { len, entries } => (*len, entries.len()),
            Body::String { len, text } => (*len, text.len()),
            _ => return 0,
        };
        u64::try_from(len)
            .unwrap_or(0)
            .saturating_sub(held as u64)
    }

    pub fn is_lazy_struct(&self) -> bool {
        match &self.body {
            Body::Struct { len, fields } => fields.is_empty() && *len != 0,
            _ => false,
        }
    }

    /// Pins the logical length to what is held so no further loads are offered.
    pub fn pin_length(&mut self) {
        match &mut self.body {
            Body::Slice { len, elems, .. } | Body::Array { len, elems } => {
                *len = elems.len() as i64
            }
            Body::Map { len, entries } => *len = entries.len() as i64,
            Body::Struct { len, fields } => *len = fields.len() as i64,
            _ => {}
        }
    }

    /// Appends the children of `fetched`, a value loaded from an offset into
    /// this one. Returns the number of elements or pairs appended.
    pub fn append_from(&mut self, fetched: ValueNode) -> usize {
        match (&mut self.body, fetched.body) {
            (Body::Slice { elems, .. }, Body::Slice { elems: more, .. })
            | (Body::Slice { elems, .. }, Body::Array { elems: more, .. })
            | (Body::Array { elems, .. }, Body::Slice { elems: more, .. })
            | (Body::Array { elems, .. }, Body::Array { elems: more, .. }) => {
                let added = more.len();
                elems.extend(more);
                added
            }
            (Body::Map { entries, .. }, Body::Map { entries: more, .. }) => {
                let added = more.len();
                entries.extend(more);
                added
            }
            _ => 0,
        }
    }

    /// Replaces this node with a full reload of the same value.
    pub fn replace_with(&mut self, fetched: ValueNode) {
        let name = std::mem::take(&mut self.name);
        *self = fetched;
        self.name = name;
    }

    /// Child addressed by a path step. Map entries use `2 * i` for the key
    /// and `2 * i + 1` for the value.
    pub fn child(&self, index: usize) -> Option<&ValueNode> {
        match &self.body {
            Body::Slice { elems, .. } | Body::Array { elems, .. } => elems.get(index),
            Body::Struct { fields, .. } | Body::Channel { fields } => fields.get(index),
            Body::Map { entries, .. } => entries.get(index / 2).map(|entry| {
                if index % 2 == 0 {
                    &entry.key
                } else {
                    &entry.value
                }
            }),
            Body::Pointer(PointerTarget::Value(target)) if index == 0 => Some(target),
            Body::Interface { held: Some(held) } if index == 0 => Some(held),
            _ => None,
        }
    }

    pub fn child_mut(&mut self, index: usize) -> Option<&mut ValueNode> {
        match &mut self.body {
            Body::Slice { elems, .. } | Body::Array { elems, .. } => elems.get_mut(index),
            Body::Struct { fields, .. } | Body::Channel { fields } => fields.get_mut(index),
            Body::Map { entries, .. } => entries.get_mut(index / 2).map(|entry| {
                if index % 2 == 0 {
                    &mut entry.key
                } else {
                    &mut entry.value
                }
            }),
            Body::Pointer(PointerTarget::Value(target)) if index == 0 => Some(target),
            Body::Interface { held: Some(held) } if index == 0 => Some(held),
            _ => None,
        }
    }

    pub fn descendant(&self, path: &[usize]) -> Option<&ValueNode> {
        path.iter()
            .try_fold(self, |node, &index| node.child(index))
    }

    pub fn descendant_mut(&mut self, path: &[usize]) -> Option<&mut ValueNode> {
        let mut node = self;
        for &index in path {
            node = node.child_mut(index)?;
        }
        Some(node)
    }
}
