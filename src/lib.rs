//! # statewire - reactive hierarchical state with dependency-tracking events
//!
//! statewire keeps application state in named, hierarchical namespaces and
//! re-evaluates registered conditions whenever a namespace they read changes.
//!
//! ## Core Concepts
//!
//! - **Store**: owns the namespace roots (`registry`, `config`, plus any
//!   created on first write) and everything bound to them
//! - **Namespace**: a tree addressed by dotted paths; writes create missing
//!   intermediate nodes, reads never do
//! - **Handler**: a condition/action pair whose dependency set is traced once
//!   at registration; actions fire on false-to-true transitions
//! - **Executor**: a bounded FIFO worker pool for deferred actions and
//!   callable proxies
//! - **Console**: the leveled message sink actions write to
//!
//! ## Usage
//!
//! ```rust
//! use statewire::{Console, Store, CONFIG, REGISTRY};
//!
//! let store = Store::new();
//!
//! store.register(
//!     |s| s.config("value").eq_str("secondary") & s.registry("options.current").renders_as("1"),
//!     |s| s.console().success("secondary: option 1 selected"),
//! );
//!
//! store.set(CONFIG, "value", "secondary")?;
//! store.set(REGISTRY, "options.current", "1")?; // fires
//! store.set(REGISTRY, "test", "1")?; // does not fire again
//! # Ok::<(), statewire::StoreError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod console;
pub mod error;
pub mod events;
pub mod executor;
pub mod logging;
pub mod namespace;
pub mod store;
pub mod value;

// Re-export primary types at crate root for convenience
pub use config::StoreConfig;
pub use console::{Console, ConsoleLevel, MemoryConsole, TracingConsole};
pub use error::{ActionError, ConditionError, PathError, StateError, StateResult, StoreError, TaskError};
pub use events::{
    DispatchMode, DispatchStats, EventBuilder, EventEngine, HandlerId, MutationKind,
    MutationNotice, StateView, TriggerMode,
};
pub use executor::{DeferredFn, Executor, ExecutorConfig, TaskHandle, TaskId, TaskStatus};
pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingError};
pub use namespace::{Lookup, NamespaceNode, NamespacePath, CONFIG, REGISTRY};
pub use store::Store;
pub use value::Value;
