use chrono::{DateTime, Utc};

use crate::namespace::NamespacePath;

/// What kind of write produced a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// A leaf was written.
    Set,
    /// A leaf or subtree was removed.
    Remove,
}

/// Describes a completed write. Produced and consumed within one dispatch pass.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationNotice {
    /// Root that was written.
    pub root: String,
    /// Path written below the root; the root path for a cleared root.
    pub path: NamespacePath,
    /// Kind of write.
    pub kind: MutationKind,
    /// When the write completed.
    pub at: DateTime<Utc>,
}

impl MutationNotice {
    pub(crate) fn new(root: &str, path: NamespacePath, kind: MutationKind) -> Self {
        Self {
            root: root.to_string(),
            path,
            kind,
            at: Utc::now(),
        }
    }
}
