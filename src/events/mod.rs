//! Dependency-tracking event engine.
//!
//! Handlers pair a condition with an action. At registration the condition
//! runs once against a tracing [`StateView`]; every root it reads becomes the
//! handler's fixed dependency set. After that, each mutation of a root
//! re-evaluates the handlers depending on it, in registration order, and runs
//! the action on a false-to-true transition (edge mode) or on every true
//! evaluation (level mode).
//!
//! Conditions should read every value they depend on: `&&` short-circuits,
//! so a root read only on its right-hand side is missed if the left side is
//! false at registration. Combine with `&` instead, or name the root
//! explicitly with [`EventBuilder::depends_on`]. Later evaluations that read
//! a root outside the traced set are logged at debug level and counted in
//! [`DispatchStats::untracked_reads`].

/// Handler table and dispatch.
pub mod engine;
/// Handler definitions and registration builder.
pub mod handler;
/// Mutation notices.
pub mod notice;
/// Instrumented read access for conditions.
pub mod view;

pub use engine::{DispatchStats, EventEngine};
pub use handler::{ActionOutcome, ConditionOutcome, DispatchMode, EventBuilder, HandlerId, TriggerMode};
pub use notice::{MutationKind, MutationNotice};
pub use view::StateView;
