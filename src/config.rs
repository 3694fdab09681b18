//! Store configuration.

use serde::Deserialize;

use crate::events::TriggerMode;
use crate::executor::ExecutorConfig;

/// Configuration for a [`Store`](crate::Store).
///
/// Every field has a default, so partial documents deserialize:
///
/// ```
/// let cfg: statewire::StoreConfig =
///     serde_json::from_str(r#"{"executor": {"workers": 2}}"#).unwrap();
/// assert_eq!(cfg.executor.workers, 2);
/// assert_eq!(cfg.executor.queue_capacity, 1024);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Worker pool used by deferred actions and proxies.
    pub executor: ExecutorConfig,
    /// Trigger mode for handlers that do not choose one.
    pub default_trigger: TriggerMode,
}

impl StoreConfig {
    /// Sets the default trigger mode.
    #[must_use]
    pub fn with_default_trigger(mut self, mode: TriggerMode) -> Self {
        self.default_trigger = mode;
        self
    }

    /// Sets the executor configuration.
    #[must_use]
    pub fn with_executor(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = StoreConfig::default();
        assert_eq!(cfg.default_trigger, TriggerMode::Edge);
        assert_eq!(cfg.executor.workers, 4);
    }

    #[test]
    fn deserialize_partial() {
        let cfg: StoreConfig = serde_json::from_str(r#"{"default_trigger": "level"}"#).unwrap();
        assert_eq!(cfg.default_trigger, TriggerMode::Level);
        assert_eq!(cfg.executor.queue_capacity, 1024);
    }

    #[test]
    fn builder_methods() {
        let cfg = StoreConfig::default()
            .with_default_trigger(TriggerMode::Level)
            .with_executor(ExecutorConfig {
                workers: 1,
                ..ExecutorConfig::default()
            });
        assert_eq!(cfg.default_trigger, TriggerMode::Level);
        assert_eq!(cfg.executor.workers, 1);
    }
}
