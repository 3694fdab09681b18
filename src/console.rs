//! Console sink for leveled messages.
//!
//! Actions write user-facing output here, and the event engine reports
//! condition and action failures through it. A console never touches
//! namespace state.

use std::fmt;

use parking_lot::Mutex;

/// Message level.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsoleLevel {
    Plain,
    Info,
    Success,
    Warning,
    Error,
}

impl ConsoleLevel {
    /// Lowercase tag used in formatted output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sink for leveled messages.
pub trait Console: Send + Sync {
    /// Writes one message.
    fn write(&self, level: ConsoleLevel, message: &str);

    /// Writes an unleveled message.
    fn print(&self, message: &str) {
        self.write(ConsoleLevel::Plain, message);
    }

    /// Writes an informational message.
    fn info(&self, message: &str) {
        self.write(ConsoleLevel::Info, message);
    }

    /// Writes a success message.
    fn success(&self, message: &str) {
        self.write(ConsoleLevel::Success, message);
    }

    /// Writes a warning.
    fn warning(&self, message: &str) {
        self.write(ConsoleLevel::Warning, message);
    }

    /// Writes an error.
    fn error(&self, message: &str) {
        self.write(ConsoleLevel::Error, message);
    }
}

/// Console that forwards every message to `tracing` under the
/// `statewire::console` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingConsole;

impl Console for TracingConsole {
    fn write(&self, level: ConsoleLevel, message: &str) {
        match level {
            ConsoleLevel::Plain | ConsoleLevel::Info | ConsoleLevel::Success => {
                tracing::info!(target: "statewire::console", level = level.as_str(), "{message}");
            }
            ConsoleLevel::Warning => {
                tracing::warn!(target: "statewire::console", "{message}");
            }
            ConsoleLevel::Error => {
                tracing::error!(target: "statewire::console", "{message}");
            }
        }
    }
}

/// Console that keeps messages in memory.
#[derive(Debug, Default)]
pub struct MemoryConsole {
    lines: Mutex<Vec<(ConsoleLevel, String)>>,
}

impl MemoryConsole {
    /// Creates an empty console.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages written so far.
    #[must_use]
    pub fn lines(&self) -> Vec<(ConsoleLevel, String)> {
        self.lines.lock().clone()
    }

    /// Messages written at one level.
    #[must_use]
    pub fn at(&self, level: ConsoleLevel) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Drops all recorded messages.
    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl Console for MemoryConsole {
    fn write(&self, level: ConsoleLevel, message: &str) {
        self.lines.lock().push((level, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_console_records_levels() {
        let console = MemoryConsole::new();
        console.info("starting");
        console.success("done");
        console.warning("careful");
        console.print("plain");
        console.error("bad");

        assert_eq!(console.lines().len(), 5);
        assert_eq!(console.at(ConsoleLevel::Success), vec!["done".to_string()]);
        assert_eq!(console.at(ConsoleLevel::Plain), vec!["plain".to_string()]);

        console.clear();
        assert!(console.lines().is_empty());
    }

    #[test]
    fn tracing_console_accepts_every_level() {
        let console = TracingConsole;
        for level in [
            ConsoleLevel::Plain,
            ConsoleLevel::Info,
            ConsoleLevel::Success,
            ConsoleLevel::Warning,
            ConsoleLevel::Error,
        ] {
            console.write(level, "message");
        }
    }

    #[test]
    fn level_display() {
        assert_eq!(ConsoleLevel::Warning.to_string(), "warning");
    }
}
