use super::config::LogConfig;
use super::dispatch::{Interceptor, Invocation, LogLine, Operation, dispatch};
use super::identity::{ConnectionId, StatementId};
use crate::error::{DbError, DbResult};
use crate::resource::Cursor;
use crate::value::SqlValue;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle of an instrumented cursor as observed by its interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Not advanced yet.
    Idle,
    /// Advanced at least once.
    Active,
    /// Closed or dropped. Nothing more is recorded.
    Closed,
}

pub(crate) struct CursorTap {
    config: Arc<LogConfig>,
    connection: ConnectionId,
    statement: StatementId,
    state: CursorState,
    started: Option<Instant>,
    first_row: Option<Instant>,
    /// Starts at -1; the advance that reports exhaustion also counts.
    rows: i64,
}

impl CursorTap {
    pub(crate) fn new(config: Arc<LogConfig>, connection: ConnectionId, statement: StatementId) -> Self {
        Self {
            config,
            connection,
            statement,
            state: CursorState::Idle,
            started: None,
            first_row: None,
            rows: -1,
        }
    }

    fn since_start(&self, at: Option<Instant>) -> Duration {
        match (self.started, at) {
            (Some(started), Some(at)) => at.saturating_duration_since(started),
            _ => Duration::ZERO,
        }
    }

    fn report(&self, ending: &str, finished: Instant, elapsed: Duration, error: Option<&DbError>) {
        let first_row = self.since_start(self.first_row);
        let all_rows = self.since_start(Some(finished));
        let line = LogLine::new(
            self.config.line_prefix(),
            Some(self.connection),
            Some(self.statement),
        )
        .field("cursor row count", self.rows)
        .field("first row time", first_row.as_millis())
        .field("all rows time", all_rows.as_millis())
        .word(ending)
        .finish(elapsed, error);
        self.config.emit(&line);
    }

    /// Called when the cursor goes away without an explicit close.
    fn dropped(&mut self) {
        if self.state == CursorState::Closed {
            return;
        }
        self.state = CursorState::Closed;
        if self.config.cursors_enabled() {
            self.report("dropped", Instant::now(), Duration::ZERO, None);
        }
    }
}

impl Interceptor for CursorTap {
    fn before(&mut self, op: &Operation<'_>) {
        if matches!(op, Operation::Advance)
            && self.state != CursorState::Closed
            && self.started.is_none()
            && self.config.is_enabled()
        {
            self.started = Some(Instant::now());
        }
    }

    fn after(&mut self, call: &Invocation<'_>) {
        if self.state == CursorState::Closed {
            return;
        }
        match call.op {
            Operation::Advance => {
                if self.config.is_enabled() {
                    self.first_row.get_or_insert_with(Instant::now);
                    self.rows += 1;
                    self.state = CursorState::Active;
                }
            }
            Operation::Close => {
                let finished = Instant::now();
                self.state = CursorState::Closed;
                if self.config.cursors_enabled() {
                    self.report("close", finished, call.elapsed, call.error);
                }
            }
            _ => {}
        }
    }
}

/// A cursor that counts rows and times the first and last of them,
/// reporting both when closed.
///
/// A cursor dropped without being closed still reports, marked `dropped`.
pub struct InstrumentedCursor<K> {
    inner: K,
    tap: Option<CursorTap>,
}

impl<K: Cursor> InstrumentedCursor<K> {
    pub(crate) fn new(inner: K, tap: Option<CursorTap>) -> Self {
        Self { inner, tap }
    }

    /// Observed lifecycle, or `None` when the cursor is not being logged.
    pub fn state(&self) -> Option<CursorState> {
        self.tap.as_ref().map(|tap| tap.state)
    }

    /// Rows counted so far, or `None` when the cursor is not being logged.
    pub fn row_count(&self) -> Option<i64> {
        self.tap.as_ref().map(|tap| tap.rows)
    }

    pub fn inner(&self) -> &K {
        &self.inner
    }
}

impl<K: Cursor> Cursor for InstrumentedCursor<K> {
    async fn advance(&mut self) -> DbResult<bool> {
        dispatch(&mut self.tap, Operation::Advance, self.inner.advance()).await
    }

    fn value(&self, column: usize) -> DbResult<SqlValue> {
        self.inner.value(column)
    }

    fn column_count(&self) -> usize {
        self.inner.column_count()
    }

    fn column_name(&self, column: usize) -> Option<&str> {
        self.inner.column_name(column)
    }

    async fn close(&mut self) -> DbResult<()> {
        dispatch(&mut self.tap, Operation::Close, self.inner.close()).await
    }
}

impl<K> Drop for InstrumentedCursor<K> {
    fn drop(&mut self) {
        if let Some(tap) = self.tap.as_mut() {
            tap.dropped();
        }
    }
}
