use super::config::LogConfig;
use super::dispatch::{Interceptor, Invocation, LogLine, Operation, dispatch};
use super::identity::{ConnectionId, IdentityAllocator, StatementId};
use super::prepared::{InstrumentedPreparedStatement, PreparedTap};
use super::statement::{InstrumentedStatement, StatementTap};
use crate::error::DbResult;
use crate::resource::{Connection, DataSource};
use std::sync::Arc;

/// Connection-level hooks: transaction boundaries.
pub(super) struct ConnectionTap {
    config: Arc<LogConfig>,
    id: ConnectionId,
}

impl Interceptor for ConnectionTap {
    fn after(&mut self, call: &Invocation<'_>) {
        if !matches!(call.op, Operation::Commit | Operation::Rollback) {
            return;
        }
        if !self.config.transactions_enabled() {
            return;
        }
        let line = LogLine::new(self.config.line_prefix(), Some(self.id), None)
            .word(call.op.name())
            .finish(call.elapsed, call.error);
        self.config.emit(&line);
    }
}

/// A connection whose statements, cursors and transactions are logged.
///
/// Statements created while statement logging is enabled are instrumented
/// and tagged with this connection's identity; statements created while it
/// is off pass every call straight through.
pub struct InstrumentedConnection<C> {
    inner: C,
    tap: ConnectionTap,
    ids: IdentityAllocator,
}

impl<C: Connection> InstrumentedConnection<C> {
    /// Wrap `inner`, drawing identities from the process-wide allocator.
    pub fn new(inner: C, config: impl Into<Arc<LogConfig>>) -> Self {
        Self::with_allocator(inner, config, IdentityAllocator::global())
    }

    /// Wrap `inner`, drawing identities from `ids`.
    pub fn with_allocator(
        inner: C,
        config: impl Into<Arc<LogConfig>>,
        ids: IdentityAllocator,
    ) -> Self {
        let id = ids.next_connection();
        tracing::debug!(target: "dblog", connection = %id, "instrumenting connection");
        Self {
            inner,
            tap: ConnectionTap {
                config: config.into(),
                id,
            },
            ids,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.tap.id
    }

    pub fn config(&self) -> &LogConfig {
        &self.tap.config
    }

    /// Get a reference to the wrapped connection.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Get the wrapped connection, consuming this wrapper.
    pub fn into_inner(self) -> C {
        self.inner
    }

    fn statement_ids(&self) -> Option<(Arc<LogConfig>, ConnectionId, StatementId)> {
        self.tap
            .config
            .statements_enabled()
            .then(|| (self.tap.config.clone(), self.tap.id, self.ids.next_statement()))
    }
}

impl<C: Connection> Connection for InstrumentedConnection<C> {
    type Statement = InstrumentedStatement<C::Statement>;
    type PreparedStatement = InstrumentedPreparedStatement<C::PreparedStatement>;

    async fn create_statement(&mut self) -> DbResult<Self::Statement> {
        let statement = dispatch(
            &mut self.tap,
            Operation::CreateStatement,
            self.inner.create_statement(),
        )
        .await?;
        let tap = self
            .statement_ids()
            .map(|(config, connection, id)| StatementTap::new(config, connection, id));
        Ok(InstrumentedStatement::new(statement, tap))
    }

    async fn prepare_statement(&mut self, sql: &str) -> DbResult<Self::PreparedStatement> {
        let statement = dispatch(
            &mut self.tap,
            Operation::PrepareStatement,
            self.inner.prepare_statement(sql),
        )
        .await?;
        let tap = self
            .statement_ids()
            .map(|(config, connection, id)| PreparedTap::new(config, connection, id, sql));
        Ok(InstrumentedPreparedStatement::new(statement, tap))
    }

    async fn commit(&mut self) -> DbResult<()> {
        dispatch(&mut self.tap, Operation::Commit, self.inner.commit()).await
    }

    async fn rollback(&mut self) -> DbResult<()> {
        dispatch(&mut self.tap, Operation::Rollback, self.inner.rollback()).await
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> DbResult<()> {
        dispatch(
            &mut self.tap,
            Operation::Other("set_auto_commit"),
            self.inner.set_auto_commit(auto_commit),
        )
        .await
    }

    fn auto_commit(&self) -> bool {
        self.inner.auto_commit()
    }

    async fn close(&mut self) -> DbResult<()> {
        dispatch(&mut self.tap, Operation::Close, self.inner.close()).await
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// A data source handing out instrumented connections.
///
/// All connections share one logging policy and one identity allocator.
pub struct LogDataSource<D> {
    inner: D,
    config: Arc<LogConfig>,
    ids: IdentityAllocator,
}

impl<D: DataSource> LogDataSource<D> {
    pub fn new(inner: D, config: impl Into<Arc<LogConfig>>) -> Self {
        Self::with_allocator(inner, config, IdentityAllocator::global())
    }

    pub fn with_allocator(
        inner: D,
        config: impl Into<Arc<LogConfig>>,
        ids: IdentityAllocator,
    ) -> Self {
        Self {
            inner,
            config: config.into(),
            ids,
        }
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Get a reference to the wrapped data source.
    pub fn inner(&self) -> &D {
        &self.inner
    }
}

impl<D: DataSource> DataSource for LogDataSource<D> {
    type Connection = InstrumentedConnection<D::Connection>;

    async fn connect(&self) -> DbResult<Self::Connection> {
        let conn = self.inner.connect().await?;
        Ok(InstrumentedConnection::with_allocator(
            conn,
            self.config.clone(),
            self.ids.clone(),
        ))
    }
}
