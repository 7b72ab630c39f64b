use super::sink::{FnSink, LogSink};
use serde::Deserialize;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Prefix every log line starts with unless overridden.
pub const DEFAULT_PREFIX: &str = "jdbc";

/// Logging policy shared by every interceptor created under it.
///
/// Statement, cursor and transaction logging are enabled by default. The
/// toggles are set through the builder methods before the configuration is
/// handed to [`instrument`](super::instrument); afterwards it is shared
/// read-only behind an `Arc`.
#[derive(Clone)]
pub struct LogConfig {
    sink: Arc<dyn LogSink>,
    log_statements: bool,
    log_cursors: bool,
    log_transactions: bool,
    prefix: String,
}

impl LogConfig {
    /// Create a configuration writing to `sink`.
    pub fn new<S: LogSink + 'static>(sink: S) -> Self {
        Self::from_sink_arc(Arc::new(sink))
    }

    /// Create a configuration from a shared sink.
    pub fn from_sink_arc(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            log_statements: true,
            log_cursors: true,
            log_transactions: true,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    /// Create a configuration from the two sink capabilities.
    pub fn from_fns<E, A>(is_enabled: E, accept: A) -> Self
    where
        E: Fn() -> bool + Send + Sync + 'static,
        A: Fn(&str) + Send + Sync + 'static,
    {
        Self::new(FnSink::new(is_enabled, accept))
    }

    /// Log executed statements (and wrap statements so they can be logged).
    pub fn statements(mut self, log: bool) -> Self {
        self.log_statements = log;
        self
    }

    /// Log cursor row counts and timings on close.
    pub fn cursors(mut self, log: bool) -> Self {
        self.log_cursors = log;
        self
    }

    /// Log commit and rollback.
    pub fn transactions(mut self, log: bool) -> Self {
        self.log_transactions = log;
        self
    }

    /// Replace the leading word of every line.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Apply toggles loaded from a settings file.
    pub fn with_settings(self, settings: &LogSettings) -> Self {
        self.statements(settings.statements)
            .cursors(settings.cursors)
            .transactions(settings.transactions)
            .prefix(settings.prefix.clone())
    }

    pub fn logs_statements(&self) -> bool {
        self.log_statements
    }

    pub fn logs_cursors(&self) -> bool {
        self.log_cursors
    }

    pub fn logs_transactions(&self) -> bool {
        self.log_transactions
    }

    pub fn line_prefix(&self) -> &str {
        &self.prefix
    }

    /// Ask the sink whether logging is on right now.
    ///
    /// A panicking check counts as "off".
    pub fn is_enabled(&self) -> bool {
        let sink = &self.sink;
        match catch_unwind(AssertUnwindSafe(|| sink.is_enabled())) {
            Ok(enabled) => enabled,
            Err(_) => {
                tracing::warn!(target: "dblog", "log sink enabled-check panicked; treating as disabled");
                false
            }
        }
    }

    pub(crate) fn statements_enabled(&self) -> bool {
        self.log_statements && self.is_enabled()
    }

    pub(crate) fn cursors_enabled(&self) -> bool {
        self.log_cursors && self.is_enabled()
    }

    pub(crate) fn transactions_enabled(&self) -> bool {
        self.log_transactions && self.is_enabled()
    }

    /// Hand one finished line to the sink. Sink panics stay on the logging path.
    pub(crate) fn emit(&self, line: &str) {
        let sink = &self.sink;
        if catch_unwind(AssertUnwindSafe(|| sink.accept(line))).is_err() {
            tracing::warn!(target: "dblog", "log sink panicked; line dropped");
        }
    }
}

impl fmt::Debug for LogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogConfig")
            .field("log_statements", &self.log_statements)
            .field("log_cursors", &self.log_cursors)
            .field("log_transactions", &self.log_transactions)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// Logging toggles as they appear in a configuration file.
///
/// ```toml
/// [log]
/// statements = true
/// cursors = false
/// transactions = true
/// prefix = "sql"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub statements: bool,
    pub cursors: bool,
    pub transactions: bool,
    pub prefix: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            statements: true,
            cursors: true,
            transactions: true,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}
