//! Hierarchical namespaces.
//!
//! A namespace is a tree of nodes addressed by dotted paths. Writes create
//! missing intermediate nodes; reads never create anything.

/// Tree nodes and read results.
pub mod node;
/// Dotted path parsing.
pub mod path;

pub use node::{Lookup, NamespaceNode, Slot};
pub use path::NamespacePath;

/// Name of the process-wide registry root.
pub const REGISTRY: &str = "registry";

/// Name of the process-wide configuration root.
pub const CONFIG: &str = "config";
