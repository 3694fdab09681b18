use std::cell::RefCell;
use std::collections::BTreeSet;

use crate::error::ConditionError;
use crate::namespace::{Lookup, CONFIG, REGISTRY};
use crate::store::Store;
use crate::value::Value;

/// Read-only access to the store handed to conditions.
///
/// Every root touched through the view is recorded. While a handler is
/// being registered (tracing mode) that record becomes its dependency set;
/// on later evaluations the engine compares it against that set.
pub struct StateView<'a> {
    store: &'a Store,
    tracing: bool,
    reads: RefCell<BTreeSet<String>>,
}

impl<'a> StateView<'a> {
    pub(crate) fn live(store: &'a Store) -> Self {
        Self {
            store,
            tracing: false,
            reads: RefCell::new(BTreeSet::new()),
        }
    }

    pub(crate) fn tracing(store: &'a Store) -> Self {
        Self {
            tracing: true,
            ..Self::live(store)
        }
    }

    pub(crate) fn into_trace(self) -> BTreeSet<String> {
        self.reads.into_inner()
    }

    /// True while the view is recording dependencies for a new handler.
    #[must_use]
    pub const fn is_tracing(&self) -> bool {
        self.tracing
    }

    fn touch(&self, root: &str) {
        let mut reads = self.reads.borrow_mut();
        if !reads.contains(root) {
            reads.insert(root.to_string());
        }
    }

    /// Reads `path` under `root`.
    #[must_use]
    pub fn get(&self, root: &str, path: &str) -> Lookup {
        self.touch(root);
        self.store.get(root, path)
    }

    /// Reads `path` under the `registry` root.
    #[must_use]
    pub fn registry(&self, path: &str) -> Lookup {
        self.get(REGISTRY, path)
    }

    /// Reads `path` under the `config` root.
    #[must_use]
    pub fn config(&self, path: &str) -> Lookup {
        self.get(CONFIG, path)
    }

    /// Truthiness of `path`; absent paths are false.
    #[must_use]
    pub fn truthy(&self, root: &str, path: &str) -> bool {
        self.get(root, path).is_truthy()
    }

    /// The leaf value at `path`.
    ///
    /// # Errors
    ///
    /// [`ConditionError::Absent`] if nothing is set, or
    /// [`ConditionError::TypeMismatch`] if the path holds a namespace.
    pub fn value(&self, root: &str, path: &str) -> Result<Value, ConditionError> {
        match self.get(root, path) {
            Lookup::Value(v) => Ok(v),
            Lookup::Absent => Err(ConditionError::Absent {
                root: root.to_string(),
                path: path.to_string(),
            }),
            Lookup::Namespace(_) => Err(mismatch(root, path, "value", "namespace")),
        }
    }

    /// The string at `path`.
    ///
    /// # Errors
    ///
    /// As [`StateView::value`], plus a type mismatch for non-string leaves.
    pub fn string(&self, root: &str, path: &str) -> Result<String, ConditionError> {
        match self.value(root, path)? {
            Value::String(s) => Ok(s),
            other => Err(mismatch(root, path, "string", other.type_name())),
        }
    }

    /// The integer at `path`.
    ///
    /// # Errors
    ///
    /// As [`StateView::value`], plus a type mismatch for non-integer leaves.
    pub fn int(&self, root: &str, path: &str) -> Result<i64, ConditionError> {
        let v = self.value(root, path)?;
        v.as_int().ok_or_else(|| mismatch(root, path, "int", v.type_name()))
    }

    /// The number at `path`, integers widened to floats.
    ///
    /// # Errors
    ///
    /// As [`StateView::value`], plus a type mismatch for non-numeric leaves.
    pub fn float(&self, root: &str, path: &str) -> Result<f64, ConditionError> {
        let v = self.value(root, path)?;
        v.as_float().ok_or_else(|| mismatch(root, path, "float", v.type_name()))
    }

    /// The boolean at `path`.
    ///
    /// # Errors
    ///
    /// As [`StateView::value`], plus a type mismatch for non-boolean leaves.
    pub fn bool(&self, root: &str, path: &str) -> Result<bool, ConditionError> {
        let v = self.value(root, path)?;
        v.as_bool().ok_or_else(|| mismatch(root, path, "bool", v.type_name()))
    }
}

fn mismatch(root: &str, path: &str, expected: &'static str, actual: &'static str) -> ConditionError {
    ConditionError::TypeMismatch {
        root: root.to_string(),
        path: path.to_string(),
        expected,
        actual,
    }
}
