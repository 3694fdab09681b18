use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{ActionError, ConditionError};
use crate::store::Store;

use super::view::StateView;

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a registered handler.
///
/// Ids increase with registration order, which is also the order in which
/// handlers sharing a dependency are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandlerId(u64);

impl HandlerId {
    fn next() -> Self {
        Self(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw registration index.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler#{}", self.0)
    }
}

/// When a handler's action runs relative to its condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Only on a false-to-true transition.
    #[default]
    Edge,
    /// On every evaluation that yields true.
    Level,
}

/// Where a handler's action runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Inline, on the mutating thread, before `set` returns.
    #[default]
    Synchronous,
    /// On the store's worker pool.
    Deferred,
}

/// Values a condition closure may return.
pub trait ConditionOutcome {
    /// Normalizes into the engine's result type.
    ///
    /// # Errors
    ///
    /// Propagates the condition's own error.
    fn into_outcome(self) -> Result<bool, ConditionError>;
}

impl ConditionOutcome for bool {
    fn into_outcome(self) -> Result<bool, ConditionError> {
        Ok(self)
    }
}

impl ConditionOutcome for Result<bool, ConditionError> {
    fn into_outcome(self) -> Result<bool, ConditionError> {
        self
    }
}

/// Values an action closure may return.
pub trait ActionOutcome {
    /// Normalizes into the engine's result type.
    ///
    /// # Errors
    ///
    /// Propagates the action's own error.
    fn into_outcome(self) -> Result<(), ActionError>;
}

impl ActionOutcome for () {
    fn into_outcome(self) -> Result<(), ActionError> {
        Ok(())
    }
}

impl<E: Into<ActionError>> ActionOutcome for Result<(), E> {
    fn into_outcome(self) -> Result<(), ActionError> {
        self.map_err(Into::into)
    }
}

pub(crate) type ConditionFn = dyn Fn(&StateView<'_>) -> Result<bool, ConditionError> + Send + Sync;
pub(crate) type ActionFn = dyn Fn(&Store) -> Result<(), ActionError> + Send + Sync;

/// A registered condition/action pair. Owned by the engine.
pub(crate) struct Handler {
    pub(crate) id: HandlerId,
    pub(crate) name: Option<String>,
    pub(crate) condition: Box<ConditionFn>,
    pub(crate) action: Arc<ActionFn>,
    pub(crate) dependencies: BTreeSet<String>,
    pub(crate) trigger: TriggerMode,
    pub(crate) dispatch: DispatchMode,
    /// Last observed condition result.
    pub(crate) last: Mutex<bool>,
    pub(crate) retired: AtomicBool,
}

impl Handler {
    pub(crate) fn depends_on(&self, root: &str) -> bool {
        self.dependencies.contains(root)
    }

    pub(crate) fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{} ({name})", self.id),
            None => self.id.to_string(),
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("trigger", &self.trigger)
            .field("dispatch", &self.dispatch)
            .finish_non_exhaustive()
    }
}

/// Builder for event handlers, obtained from [`Store::event`].
///
/// ```
/// use statewire::{Console, Store, CONFIG, REGISTRY};
///
/// let store = Store::new();
/// let id = store
///     .event()
///     .name("secondary-option-1")
///     .register(
///         |s| s.config("value").eq_str("secondary") & s.registry("opt").renders_as("1"),
///         |s| s.console().success("secondary: option 1 selected"),
///     );
/// assert_eq!(
///     store.events().dependencies(id).unwrap().into_iter().collect::<Vec<_>>(),
///     vec![CONFIG.to_string(), REGISTRY.to_string()],
/// );
/// ```
#[must_use]
pub struct EventBuilder<'s> {
    store: &'s Store,
    name: Option<String>,
    trigger: Option<TriggerMode>,
    dispatch: DispatchMode,
    extra: BTreeSet<String>,
}

impl<'s> EventBuilder<'s> {
    pub(crate) fn new(store: &'s Store) -> Self {
        Self {
            store,
            name: None,
            trigger: None,
            dispatch: DispatchMode::Synchronous,
            extra: BTreeSet::new(),
        }
    }

    /// Names the handler in logs and console reports.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Runs the action on the worker pool instead of inline.
    pub fn deferred(mut self) -> Self {
        self.dispatch = DispatchMode::Deferred;
        self
    }

    /// Sets where the action runs.
    pub fn dispatch(mut self, mode: DispatchMode) -> Self {
        self.dispatch = mode;
        self
    }

    /// Fires on every true evaluation rather than on transitions.
    pub fn level_triggered(mut self) -> Self {
        self.trigger = Some(TriggerMode::Level);
        self
    }

    /// Sets the trigger mode.
    pub fn trigger(mut self, mode: TriggerMode) -> Self {
        self.trigger = Some(mode);
        self
    }

    /// Adds a root to the dependency set in addition to the traced ones.
    pub fn depends_on(mut self, root: impl Into<String>) -> Self {
        self.extra.insert(root.into());
        self
    }

    /// Traces the condition and registers the handler.
    pub fn register<C, CR, A, AR>(self, condition: C, action: A) -> HandlerId
    where
        C: Fn(&StateView<'_>) -> CR + Send + Sync + 'static,
        CR: ConditionOutcome,
        A: Fn(&Store) -> AR + Send + Sync + 'static,
        AR: ActionOutcome,
    {
        let engine = self.store.events();
        let condition: Box<ConditionFn> =
            Box::new(move |view: &StateView<'_>| condition(view).into_outcome());
        let action: Arc<ActionFn> = Arc::new(move |store: &Store| action(store).into_outcome());

        let id = HandlerId::next();
        let mut dependencies = engine.trace(self.store, id, self.name.as_deref(), condition.as_ref());
        dependencies.extend(self.extra);

        engine.insert(Handler {
            id,
            name: self.name,
            condition,
            action,
            dependencies,
            trigger: self.trigger.unwrap_or_else(|| engine.default_trigger()),
            dispatch: self.dispatch,
            last: Mutex::new(false),
            retired: AtomicBool::new(false),
        });
        id
    }
}
