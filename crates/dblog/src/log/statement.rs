use super::config::LogConfig;
use super::cursor::{CursorTap, InstrumentedCursor};
use super::dispatch::{Interceptor, Invocation, LogLine, Operation, dispatch, dispatch_update};
use super::identity::{ConnectionId, StatementId};
use crate::error::DbResult;
use crate::resource::Statement;
use std::sync::Arc;

pub(crate) struct StatementTap {
    config: Arc<LogConfig>,
    connection: ConnectionId,
    id: StatementId,
}

impl StatementTap {
    pub(crate) fn new(config: Arc<LogConfig>, connection: ConnectionId, id: StatementId) -> Self {
        Self {
            config,
            connection,
            id,
        }
    }

    fn cursor_tap(&self) -> Option<CursorTap> {
        self.config
            .cursors_enabled()
            .then(|| CursorTap::new(self.config.clone(), self.connection, self.id))
    }
}

impl Interceptor for StatementTap {
    fn after(&mut self, call: &Invocation<'_>) {
        let (Operation::ExecuteQuery { sql: Some(sql) } | Operation::ExecuteUpdate { sql: Some(sql) }) =
            call.op
        else {
            return;
        };
        if !self.config.statements_enabled() {
            return;
        }
        let mut line = LogLine::new(self.config.line_prefix(), Some(self.connection), Some(self.id))
            .field("statement", sql);
        if let Some(rows) = call.affected {
            line = line.field("result", rows);
        }
        self.config.emit(&line.finish(call.elapsed, call.error));
    }
}

/// A plain statement that logs each executed SQL string.
pub struct InstrumentedStatement<S> {
    inner: S,
    tap: Option<StatementTap>,
}

impl<S: Statement> InstrumentedStatement<S> {
    pub(crate) fn new(inner: S, tap: Option<StatementTap>) -> Self {
        Self { inner, tap }
    }

    /// Identity assigned at creation, if statement logging was on then.
    pub fn id(&self) -> Option<StatementId> {
        self.tap.as_ref().map(|tap| tap.id)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Statement> Statement for InstrumentedStatement<S> {
    type Cursor = InstrumentedCursor<S::Cursor>;

    async fn execute_query(&mut self, sql: &str) -> DbResult<Self::Cursor> {
        let cursor = dispatch(
            &mut self.tap,
            Operation::ExecuteQuery { sql: Some(sql) },
            self.inner.execute_query(sql),
        )
        .await?;
        let tap = self.tap.as_ref().and_then(StatementTap::cursor_tap);
        Ok(InstrumentedCursor::new(cursor, tap))
    }

    async fn execute_update(&mut self, sql: &str) -> DbResult<u64> {
        dispatch_update(
            &mut self.tap,
            Operation::ExecuteUpdate { sql: Some(sql) },
            self.inner.execute_update(sql),
        )
        .await
    }

    async fn close(&mut self) -> DbResult<()> {
        dispatch(&mut self.tap, Operation::Close, self.inner.close()).await
    }
}
