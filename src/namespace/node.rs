//! Namespace tree nodes.
//!
//! A node maps keys to either a leaf [`Value`] or a child node. Children are
//! owned by their parent's map and all navigation starts at the root, so no
//! parent back-references are kept.

use std::collections::BTreeMap;

use crate::value::Value;

use super::path::NamespacePath;

/// One entry in a namespace node.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// A stored value.
    Leaf(Value),
    /// A nested namespace.
    Node(NamespaceNode),
}

/// The result of reading a path.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Nothing has been written at this path.
    Absent,
    /// A leaf value.
    Value(Value),
    /// An interior node; carries its keys in sorted order.
    Namespace(Vec<String>),
}

impl Lookup {
    /// True if nothing is stored at the path.
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// The leaf value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Consumes the lookup and returns the leaf value, if any.
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The leaf as a string slice, if it holds a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.value().and_then(Value::as_string)
    }

    /// Mixed-type equality against any value; `Absent` and namespaces never match.
    #[must_use]
    pub fn equals(&self, other: impl Into<Value>) -> bool {
        self.value().is_some_and(|v| v.loose_eq(&other.into()))
    }

    /// True if the leaf holds exactly this string.
    #[must_use]
    pub fn eq_str(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }

    /// True if the leaf renders as `other` (so `Int(1)` matches `"1"`).
    #[must_use]
    pub fn renders_as(&self, other: &str) -> bool {
        self.value().is_some_and(|v| v.render() == other)
    }

    /// Truthiness: absent is false, a namespace is true when it has keys.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Absent => false,
            Self::Value(v) => v.is_truthy(),
            Self::Namespace(keys) => !keys.is_empty(),
        }
    }

    /// Short name of the variant, used in diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Value(v) => v.type_name(),
            Self::Namespace(_) => "namespace",
        }
    }
}

/// Why a write was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WriteRefusal {
    /// Descending required entering a leaf; carries the leaf's dotted path.
    ThroughLeaf(String),
    /// The root path cannot hold a leaf.
    AtRoot,
}

/// One level of a hierarchical namespace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceNode {
    children: BTreeMap<String, Slot>,
}

impl NamespaceNode {
    /// Creates an empty node.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the node has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of direct entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Keys of the direct entries in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.children.keys().cloned().collect()
    }

    /// Reads a path without creating anything.
    #[must_use]
    pub fn lookup(&self, path: &NamespacePath) -> Lookup {
        let Some((parents, last)) = path.split_last() else {
            return Lookup::Namespace(self.keys());
        };

        let mut node = self;
        for segment in parents {
            match node.children.get(segment) {
                Some(Slot::Node(child)) => node = child,
                Some(Slot::Leaf(_)) | None => return Lookup::Absent,
            }
        }

        match node.children.get(last) {
            None => Lookup::Absent,
            Some(Slot::Leaf(v)) => Lookup::Value(v.clone()),
            Some(Slot::Node(child)) => Lookup::Namespace(child.keys()),
        }
    }

    /// Writes a leaf, creating intermediate nodes as needed.
    ///
    /// The conflict check runs before any node is created, so a refused
    /// write leaves the tree untouched.
    pub(crate) fn write(&mut self, path: &NamespacePath, value: Value) -> Result<(), WriteRefusal> {
        let Some((parents, last)) = path.split_last() else {
            return Err(WriteRefusal::AtRoot);
        };

        let mut probe: &NamespaceNode = &*self;
        for (depth, segment) in parents.iter().enumerate() {
            match probe.children.get(segment) {
                Some(Slot::Leaf(_)) => return Err(WriteRefusal::ThroughLeaf(path.prefix(depth + 1))),
                Some(Slot::Node(child)) => probe = child,
                None => break,
            }
        }

        let mut node = self;
        for (depth, segment) in parents.iter().enumerate() {
            let slot = node
                .children
                .entry(segment.clone())
                .or_insert_with(|| Slot::Node(NamespaceNode::new()));
            node = match slot {
                Slot::Node(child) => child,
                Slot::Leaf(_) => return Err(WriteRefusal::ThroughLeaf(path.prefix(depth + 1))),
            };
        }

        node.children.insert(last.to_string(), Slot::Leaf(value));
        Ok(())
    }

    /// Removes a leaf or subtree. Returns true if something was removed.
    pub(crate) fn remove(&mut self, path: &NamespacePath) -> bool {
        let Some((parents, last)) = path.split_last() else {
            let had_entries = !self.children.is_empty();
            self.children.clear();
            return had_entries;
        };

        let mut node = self;
        for segment in parents {
            match node.children.get_mut(segment) {
                Some(Slot::Node(child)) => node = child,
                Some(Slot::Leaf(_)) | None => return false,
            }
        }
        node.children.remove(last).is_some()
    }

    /// Exports the subtree as plain JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .children
            .iter()
            .map(|(key, slot)| {
                let v = match slot {
                    Slot::Leaf(value) => value.to_json(),
                    Slot::Node(child) => child.to_json(),
                };
                (key.clone(), v)
            })
            .collect();
        serde_json::Value::Object(map)
    }
}
