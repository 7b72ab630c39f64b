use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::Level;

/// Destination for finished log lines.
///
/// `is_enabled` is consulted on every intercepted call that may log, so it
/// should be cheap. It may change value at any time.
pub trait LogSink: Send + Sync {
    /// Whether lines should be produced right now.
    fn is_enabled(&self) -> bool;

    /// Accept one formatted line.
    fn accept(&self, line: &str);
}

impl<S: LogSink + ?Sized> LogSink for Arc<S> {
    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }

    fn accept(&self, line: &str) {
        (**self).accept(line)
    }
}

/// A sink built from an enabled-check and a line consumer.
pub struct FnSink<E, A> {
    is_enabled: E,
    accept: A,
}

impl<E, A> FnSink<E, A>
where
    E: Fn() -> bool + Send + Sync,
    A: Fn(&str) + Send + Sync,
{
    pub fn new(is_enabled: E, accept: A) -> Self {
        Self { is_enabled, accept }
    }
}

impl<E, A> LogSink for FnSink<E, A>
where
    E: Fn() -> bool + Send + Sync,
    A: Fn(&str) + Send + Sync,
{
    fn is_enabled(&self) -> bool {
        (self.is_enabled)()
    }

    fn accept(&self, line: &str) {
        (self.accept)(line)
    }
}

/// Prints lines to stderr behind a runtime switch.
#[derive(Debug)]
pub struct StderrSink {
    enabled: AtomicBool,
}

impl Default for StderrSink {
    fn default() -> Self {
        Self {
            enabled: AtomicBool::new(true),
        }
    }
}

impl StderrSink {
    /// Create an enabled sink.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }
}

impl LogSink for StderrSink {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn accept(&self, line: &str) {
        eprintln!("{line}");
    }
}

/// Forwards lines as `tracing` events under the `dblog.sql` target.
///
/// The enabled-check asks the current subscriber whether an event at the
/// configured level would be recorded, so `RUST_LOG=dblog.sql=debug` turns
/// logging on and off without touching the configuration.
#[derive(Debug, Clone)]
pub struct TracingSink {
    /// Tracing event level to emit at.
    pub level: Level,
}

impl Default for TracingSink {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
        }
    }
}

impl TracingSink {
    /// Create a sink emitting at `DEBUG`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

impl LogSink for TracingSink {
    fn is_enabled(&self) -> bool {
        match self.level {
            Level::ERROR => tracing::enabled!(target: "dblog.sql", Level::ERROR),
            Level::WARN => tracing::enabled!(target: "dblog.sql", Level::WARN),
            Level::INFO => tracing::enabled!(target: "dblog.sql", Level::INFO),
            Level::DEBUG => tracing::enabled!(target: "dblog.sql", Level::DEBUG),
            Level::TRACE => tracing::enabled!(target: "dblog.sql", Level::TRACE),
        }
    }

    fn accept(&self, line: &str) {
        match self.level {
            Level::ERROR => tracing::error!(target: "dblog.sql", "{line}"),
            Level::WARN => tracing::warn!(target: "dblog.sql", "{line}"),
            Level::INFO => tracing::info!(target: "dblog.sql", "{line}"),
            Level::DEBUG => tracing::debug!(target: "dblog.sql", "{line}"),
            Level::TRACE => tracing::trace!(target: "dblog.sql", "{line}"),
        }
    }
}

/// Keeps lines in memory.
#[derive(Debug)]
pub struct BufferSink {
    enabled: AtomicBool,
    lines: Mutex<Vec<String>>,
}

impl Default for BufferSink {
    fn default() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            lines: Mutex::new(Vec::new()),
        }
    }
}

impl BufferSink {
    /// Create an enabled, empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Snapshot of the collected lines.
    pub fn lines(&self) -> Vec<String> {
        self.guard().clone()
    }

    /// Remove and return the collected lines.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.guard())
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<String>> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LogSink for BufferSink {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn accept(&self, line: &str) {
        self.guard().push(line.to_string());
    }
}
