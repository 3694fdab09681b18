//! The reactive store.
//!
//! A [`Store`] owns a set of named namespace roots, the event engine bound to
//! them, a lazily started worker pool for deferred work, and the console sink
//! that handlers and error reports write to.
//!
//! Each root carries two locks:
//!
//! - a reentrant dispatch lock, held by `set`/`remove` across the write and
//!   the dispatch pass it triggers, so mutations of one root (and the handlers
//!   they fire) are serialized;
//! - a data lock, held only while a single read or write touches the tree.
//!
//! Reads therefore never wait on another root's dispatch pass, and an action
//! may freely read or write the root it was triggered from.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::{ReentrantMutex, RwLock};
use tracing::debug;

use crate::config::StoreConfig;
use crate::console::{Console, TracingConsole};
use crate::error::StoreError;
use crate::events::{
    ActionOutcome, ConditionOutcome, DispatchStats, EventBuilder, EventEngine, HandlerId,
    MutationKind, MutationNotice, StateView,
};
use crate::executor::Executor;
use crate::namespace::node::WriteRefusal;
use crate::namespace::{Lookup, NamespaceNode, NamespacePath, CONFIG, REGISTRY};
use crate::value::Value;

static GLOBAL: OnceLock<Store> = OnceLock::new();

/// One named namespace tree and its locks.
#[derive(Debug)]
struct Root {
    dispatch: ReentrantMutex<()>,
    data: RwLock<NamespaceNode>,
}

impl Root {
    fn new() -> Self {
        Self {
            dispatch: ReentrantMutex::new(()),
            data: RwLock::new(NamespaceNode::new()),
        }
    }
}

struct StoreInner {
    config: StoreConfig,
    roots: RwLock<HashMap<String, Arc<Root>>>,
    events: EventEngine,
    executor: OnceLock<Executor>,
    console: Arc<dyn Console>,
}

/// Handle to a reactive store. Cloning is cheap and shares the same state.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("roots", &self.roots())
            .field("handlers", &self.inner.events.handler_count())
            .finish_non_exhaustive()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Creates a store with the default configuration and a tracing console.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates a store with the given configuration and a tracing console.
    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        Self::with_console(config, Arc::new(TracingConsole))
    }

    /// Creates a store that reports to the given console.
    #[must_use]
    pub fn with_console(config: StoreConfig, console: Arc<dyn Console>) -> Self {
        let mut roots = HashMap::new();
        roots.insert(REGISTRY.to_string(), Arc::new(Root::new()));
        roots.insert(CONFIG.to_string(), Arc::new(Root::new()));

        Self {
            inner: Arc::new(StoreInner {
                events: EventEngine::new(config.default_trigger),
                config,
                roots: RwLock::new(roots),
                executor: OnceLock::new(),
                console,
            }),
        }
    }

    /// The process-wide store holding the `registry` and `config` roots.
    pub fn global() -> &'static Store {
        GLOBAL.get_or_init(Store::new)
    }

    /// The configuration this store was built with.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Names of all roots, sorted.
    #[must_use]
    pub fn roots(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.roots.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn find_root(&self, name: &str) -> Option<Arc<Root>> {
        self.inner.roots.read().get(name).cloned()
    }

    fn root_or_create(&self, name: &str) -> Arc<Root> {
        if let Some(root) = self.find_root(name) {
            return root;
        }
        let mut roots = self.inner.roots.write();
        Arc::clone(roots.entry(name.to_string()).or_insert_with(|| {
            debug!(root = name, "creating namespace root");
            Arc::new(Root::new())
        }))
    }

    /// Reads the value at `path` under `root`.
    ///
    /// Never creates nodes and never fails: unknown roots, unset paths and
    /// malformed paths all read as [`Lookup::Absent`]. The empty path reads
    /// the root node itself.
    #[must_use]
    pub fn get(&self, root: &str, path: &str) -> Lookup {
        let Ok(parsed) = NamespacePath::parse(path) else {
            return Lookup::Absent;
        };
        match self.find_root(root) {
            Some(ns) => ns.data.read().lookup(&parsed),
            None if parsed.is_root() => Lookup::Namespace(Vec::new()),
            None => Lookup::Absent,
        }
    }

    /// Reads a leaf value, if one is stored at `path`.
    #[must_use]
    pub fn get_value(&self, root: &str, path: &str) -> Option<Value> {
        self.get(root, path).into_value()
    }

    /// True if a leaf or node exists at `path`.
    #[must_use]
    pub fn contains(&self, root: &str, path: &str) -> bool {
        !self.get(root, path).is_absent()
    }

    /// Keys directly below `path`; empty for leaves and absent paths.
    #[must_use]
    pub fn keys(&self, root: &str, path: &str) -> Vec<String> {
        match self.get(root, path) {
            Lookup::Namespace(keys) => keys,
            Lookup::Absent | Lookup::Value(_) => Vec::new(),
        }
    }

    /// Exports a root as plain JSON; unknown roots export as an empty object.
    #[must_use]
    pub fn snapshot(&self, root: &str) -> serde_json::Value {
        self.find_root(root).map_or_else(
            || serde_json::Value::Object(serde_json::Map::new()),
            |ns| ns.data.read().to_json(),
        )
    }

    /// Writes `value` at `path` under `root` and dispatches the mutation.
    ///
    /// Missing intermediate nodes are created and any previous leaf is
    /// replaced whatever its type. Handlers depending on `root` run before
    /// this returns (deferred handlers are enqueued).
    ///
    /// # Errors
    ///
    /// - [`StoreError::TypeConflict`] if the path descends through an
    ///   existing leaf; the tree is left unchanged and nothing is dispatched.
    /// - [`StoreError::RootNotWritable`] for the empty path.
    /// - [`StoreError::Path`] for a malformed path.
    pub fn set(&self, root: &str, path: &str, value: impl Into<Value>) -> Result<(), StoreError> {
        let parsed = NamespacePath::parse(path)?;
        let ns = self.root_or_create(root);

        let _dispatch = ns.dispatch.lock();
        ns.data
            .write()
            .write(&parsed, value.into())
            .map_err(|refusal| match refusal {
                WriteRefusal::ThroughLeaf(at) => StoreError::TypeConflict {
                    root: root.to_string(),
                    path: path.to_string(),
                    at,
                },
                WriteRefusal::AtRoot => StoreError::RootNotWritable {
                    root: root.to_string(),
                },
            })?;

        self.inner
            .events
            .dispatch(self, &MutationNotice::new(root, parsed, MutationKind::Set));
        Ok(())
    }

    /// Removes the leaf or subtree at `path`. The empty path clears the root.
    ///
    /// Dispatches a mutation only when something was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Path`] for a malformed path.
    pub fn remove(&self, root: &str, path: &str) -> Result<bool, StoreError> {
        let parsed = NamespacePath::parse(path)?;
        let Some(ns) = self.find_root(root) else {
            return Ok(false);
        };

        let _dispatch = ns.dispatch.lock();
        let removed = ns.data.write().remove(&parsed);
        if removed {
            self.inner
                .events
                .dispatch(self, &MutationNotice::new(root, parsed, MutationKind::Remove));
        }
        Ok(removed)
    }

    /// Starts building an event handler.
    #[must_use]
    pub fn event(&self) -> EventBuilder<'_> {
        EventBuilder::new(self)
    }

    /// Registers a synchronous handler with the default trigger mode.
    ///
    /// The condition is evaluated once right away to discover which roots it
    /// reads; the action does not run at registration.
    pub fn register<C, CR, A, AR>(&self, condition: C, action: A) -> HandlerId
    where
        C: Fn(&StateView<'_>) -> CR + Send + Sync + 'static,
        CR: ConditionOutcome,
        A: Fn(&Store) -> AR + Send + Sync + 'static,
        AR: ActionOutcome,
    {
        self.event().register(condition, action)
    }

    /// Registers a handler whose action runs on the worker pool.
    pub fn register_deferred<C, CR, A, AR>(&self, condition: C, action: A) -> HandlerId
    where
        C: Fn(&StateView<'_>) -> CR + Send + Sync + 'static,
        CR: ConditionOutcome,
        A: Fn(&Store) -> AR + Send + Sync + 'static,
        AR: ActionOutcome,
    {
        self.event().deferred().register(condition, action)
    }

    /// Removes a handler. Returns false if it was not registered.
    pub fn unregister(&self, id: HandlerId) -> bool {
        self.inner.events.unregister(id)
    }

    /// The event engine bound to this store.
    #[must_use]
    pub fn events(&self) -> &EventEngine {
        &self.inner.events
    }

    /// Dispatch counters.
    #[must_use]
    pub fn stats(&self) -> DispatchStats {
        self.inner.events.stats()
    }

    /// The worker pool, started on first use.
    pub fn executor(&self) -> &Executor {
        self.inner
            .executor
            .get_or_init(|| Executor::new(self.inner.config.executor.clone()))
    }

    /// The console sink.
    #[must_use]
    pub fn console(&self) -> &dyn Console {
        self.inner.console.as_ref()
    }
}
