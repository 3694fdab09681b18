//! Handler table and dispatch.
//!
//! The engine owns every registered handler. A dispatch pass for a root
//! snapshots the handlers depending on it (ordered by id), then for each one
//! re-evaluates the condition against current state under the handler's own
//! lock and applies the transition. Actions run after that lock is released,
//! so they may mutate the store and trigger nested passes.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error, trace, warn};

use crate::error::{panic_message, ActionError, ConditionError};
use crate::store::Store;

use super::handler::{ActionFn, ConditionFn, DispatchMode, Handler, HandlerId, TriggerMode};
use super::notice::MutationNotice;
use super::view::StateView;

thread_local! {
    /// Handlers whose synchronous action is executing on this thread.
    static ACTIVE: RefCell<Vec<HandlerId>> = const { RefCell::new(Vec::new()) };
}

/// Marks a handler as executing on the current thread until dropped.
struct ActiveGuard(HandlerId);

impl ActiveGuard {
    fn enter(id: HandlerId) -> Self {
        ACTIVE.with(|active| active.borrow_mut().push(id));
        Self(id)
    }

    fn is_active(id: HandlerId) -> bool {
        ACTIVE.with(|active| active.borrow().contains(&id))
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        ACTIVE.with(|active| {
            let mut active = active.borrow_mut();
            if let Some(pos) = active.iter().rposition(|id| *id == self.0) {
                active.remove(pos);
            }
        });
    }
}

/// Snapshot of dispatch counters.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub passes: u64,
    pub evaluations: u64,
    pub fired: u64,
    pub condition_errors: u64,
    pub action_errors: u64,
    pub skipped_reentrant: u64,
    pub deferred_rejected: u64,
    pub untracked_reads: u64,
}

#[derive(Debug, Default)]
struct Counters {
    passes: AtomicU64,
    evaluations: AtomicU64,
    fired: AtomicU64,
    condition_errors: AtomicU64,
    action_errors: AtomicU64,
    skipped_reentrant: AtomicU64,
    deferred_rejected: AtomicU64,
    untracked_reads: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Owns registered handlers and dispatches mutation notices to them.
#[derive(Debug)]
pub struct EventEngine {
    handlers: RwLock<BTreeMap<HandlerId, Arc<Handler>>>,
    default_trigger: TriggerMode,
    counters: Counters,
}

impl EventEngine {
    pub(crate) fn new(default_trigger: TriggerMode) -> Self {
        Self {
            handlers: RwLock::new(BTreeMap::new()),
            default_trigger,
            counters: Counters::default(),
        }
    }

    /// Trigger mode used when a handler does not pick one.
    #[must_use]
    pub const fn default_trigger(&self) -> TriggerMode {
        self.default_trigger
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// The fixed dependency set of a handler.
    #[must_use]
    pub fn dependencies(&self, id: HandlerId) -> Option<BTreeSet<String>> {
        self.handlers.read().get(&id).map(|h| h.dependencies.clone())
    }

    /// Whether a handler last observed its condition as true.
    #[must_use]
    pub fn is_armed(&self, id: HandlerId) -> Option<bool> {
        let handler = self.handlers.read().get(&id).cloned()?;
        let armed = *handler.last.lock();
        Some(armed)
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> DispatchStats {
        let c = &self.counters;
        DispatchStats {
            passes: c.passes.load(Ordering::Relaxed),
            evaluations: c.evaluations.load(Ordering::Relaxed),
            fired: c.fired.load(Ordering::Relaxed),
            condition_errors: c.condition_errors.load(Ordering::Relaxed),
            action_errors: c.action_errors.load(Ordering::Relaxed),
            skipped_reentrant: c.skipped_reentrant.load(Ordering::Relaxed),
            deferred_rejected: c.deferred_rejected.load(Ordering::Relaxed),
            untracked_reads: c.untracked_reads.load(Ordering::Relaxed),
        }
    }

    /// Runs a condition once in tracing mode and returns the roots it read.
    pub(crate) fn trace(
        &self,
        store: &Store,
        id: HandlerId,
        name: Option<&str>,
        condition: &ConditionFn,
    ) -> BTreeSet<String> {
        let view = StateView::tracing(store);
        if let Err(err) = evaluate(condition, &view) {
            let label = name.map_or_else(|| id.to_string(), |n| format!("{id} ({n})"));
            self.report_condition_error(store, &label, &err);
        }
        let dependencies = view.into_trace();
        if dependencies.is_empty() {
            warn!(handler = %id, "condition reads no namespace; handler will never fire");
        }
        debug!(handler = %id, ?dependencies, "traced handler dependencies");
        dependencies
    }

    pub(crate) fn insert(&self, handler: Handler) {
        self.handlers.write().insert(handler.id, Arc::new(handler));
    }

    /// Removes a handler. A pass already in progress will not evaluate it again.
    pub fn unregister(&self, id: HandlerId) -> bool {
        match self.handlers.write().remove(&id) {
            Some(handler) => {
                handler.retired.store(true, Ordering::Release);
                debug!(handler = %id, "handler unregistered");
                true
            }
            None => false,
        }
    }

    /// Dispatches one mutation notice. Called with the root's dispatch lock held.
    pub(crate) fn dispatch(&self, store: &Store, notice: &MutationNotice) {
        let targets: Vec<Arc<Handler>> = self
            .handlers
            .read()
            .values()
            .filter(|h| h.depends_on(&notice.root))
            .cloned()
            .collect();

        Counters::bump(&self.counters.passes);
        debug!(
            root = %notice.root,
            path = %notice.path,
            kind = ?notice.kind,
            handlers = targets.len(),
            "dispatching mutation"
        );

        for handler in targets {
            if handler.retired.load(Ordering::Acquire) {
                continue;
            }
            let fire = self.evaluate_transition(store, &handler);
            if ActiveGuard::is_active(handler.id) {
                // Transition recorded; the running action is not re-entered.
                Counters::bump(&self.counters.skipped_reentrant);
                trace!(handler = %handler.id, fire, "not re-entering handler already executing on this thread");
                continue;
            }
            if fire {
                self.fire(store, &handler);
            }
        }
    }

    /// Re-evaluates a handler and applies its state transition.
    /// Returns true if the action should run.
    fn evaluate_transition(&self, store: &Store, handler: &Handler) -> bool {
        let mut last = handler.last.lock();
        Counters::bump(&self.counters.evaluations);

        let view = StateView::live(store);
        let current = match evaluate(handler.condition.as_ref(), &view) {
            Ok(v) => v,
            Err(err) => {
                self.report_condition_error(store, &handler.label(), &err);
                false
            }
        };

        let untracked: Vec<String> = view
            .into_trace()
            .into_iter()
            .filter(|root| !handler.depends_on(root))
            .collect();
        if !untracked.is_empty() {
            Counters::bump(&self.counters.untracked_reads);
            debug!(
                handler = %handler.label(),
                ?untracked,
                "condition read roots missing from its dependency set; \
                 writes to them will not re-evaluate it (use `&` or depends_on)"
            );
        }

        let fire = match (*last, current, handler.trigger) {
            (false, true, _) | (true, true, TriggerMode::Level) => true,
            (true, true, TriggerMode::Edge) | (_, false, _) => false,
        };
        trace!(handler = %handler.id, previous = *last, current, fire, "evaluated condition");
        *last = current;
        fire
    }

    fn fire(&self, store: &Store, handler: &Handler) {
        Counters::bump(&self.counters.fired);
        match handler.dispatch {
            DispatchMode::Synchronous => {
                let _active = ActiveGuard::enter(handler.id);
                if let Err(err) = invoke(handler.action.as_ref(), store) {
                    self.report_action_error(store, &handler.label(), &err);
                }
            }
            DispatchMode::Deferred => {
                let action = Arc::clone(&handler.action);
                let task_store = store.clone();
                let id = handler.id;
                let label = handler.label();
                let submitted = store.executor().spawn(move || {
                    let _active = ActiveGuard::enter(id);
                    if let Err(err) = invoke(action.as_ref(), &task_store) {
                        task_store.events().report_action_error(&task_store, &label, &err);
                    }
                });
                if let Err(err) = submitted {
                    Counters::bump(&self.counters.deferred_rejected);
                    error!(handler = %handler.id, error = %err, "deferred action rejected");
                    store
                        .console()
                        .error(&format!("{}: deferred action rejected: {err}", handler.label()));
                }
            }
        }
    }

    fn report_condition_error(&self, store: &Store, label: &str, err: &ConditionError) {
        Counters::bump(&self.counters.condition_errors);
        warn!(handler = label, error = %err, "condition evaluation failed; treated as false");
        store.console().warning(&format!("{label}: {err}"));
    }

    fn report_action_error(&self, store: &Store, label: &str, err: &ActionError) {
        Counters::bump(&self.counters.action_errors);
        error!(handler = label, error = %err, "action failed");
        store.console().error(&format!("{label}: {err}"));
    }
}

fn evaluate(condition: &ConditionFn, view: &StateView<'_>) -> Result<bool, ConditionError> {
    catch_unwind(AssertUnwindSafe(|| condition(view))).unwrap_or_else(|payload| {
        Err(ConditionError::Panicked {
            message: panic_message(payload.as_ref()),
        })
    })
}

fn invoke(action: &ActionFn, store: &Store) -> Result<(), ActionError> {
    catch_unwind(AssertUnwindSafe(|| action(store))).unwrap_or_else(|payload| {
        Err(ActionError::Panicked {
            message: panic_message(payload.as_ref()),
        })
    })
}
