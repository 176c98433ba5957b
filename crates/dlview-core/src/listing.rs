//! Ordering, name de-duplication and filtering for displayed lists.

use crate::{Breakpoint, Goroutine, Thread, ValueNode};
use std::collections::HashMap;

/// Entities listed by integer ID.
pub trait ListId {
    fn list_id(&self) -> i64;
}

impl ListId for Goroutine {
    fn list_id(&self) -> i64 {
        self.id
    }
}

impl ListId for Thread {
    fn list_id(&self) -> i64 {
        self.id
    }
}

impl ListId for Breakpoint {
    fn list_id(&self) -> i64 {
        self.id
    }
}

/// Stable ascending sort by ID; equal IDs keep their fetch order.
pub fn sort_by_id<T: ListId>(items: &mut [T]) {
    items.sort_by_key(ListId::list_id);
}

/// Stable ascending sort by variable name.
pub fn sort_by_name(vars: &mut [ValueNode]) {
    vars.sort_by(|a, b| a.name.cmp(&b.name));
}

/// Renames repeated variable names in walk order: the first occurrence stays
/// as is, the n-th repeat becomes `name(n)`.
#[derive(Debug, Default)]
pub struct NameResolver {
    seen: HashMap<String, usize>,
}

impl NameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&mut self, name: &mut String) {
        match self.seen.get_mut(name.as_str()) {
            Some(count) => {
                *count += 1;
                *name = format!("{name}({count})");
            }
            None => {
                self.seen.insert(name.clone(), 0);
            }
        }
    }

    pub fn resolve_all<'a>(&mut self, vars: impl IntoIterator<Item = &'a mut ValueNode>) {
        for var in vars {
            self.resolve(&mut var.name);
        }
    }
}

/// Sorts each group by name, then de-duplicates names across the groups in
/// the order given.
pub fn sort_and_resolve(groups: &mut [&mut Vec<ValueNode>]) {
    let mut resolver = NameResolver::new();
    for group in groups.iter_mut() {
        sort_by_name(group);
    }
    for group in groups.iter_mut() {
        resolver.resolve_all(group.iter_mut());
    }
}

/// Filter text never contains whitespace.
pub fn sanitize_filter(input: &str) -> String {
    input.chars().filter(|ch| *ch != ' ' && *ch != '\t').collect()
}

pub fn matches_filter(name: &str, filter: &str) -> bool {
    filter.is_empty() || name.contains(filter)
}
