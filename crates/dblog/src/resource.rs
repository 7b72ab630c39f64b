//! Resource traits for database access.
//!
//! These describe the surface that gets instrumented: a connection hands out
//! plain and parameterized statements, executing a query yields a cursor.
//! Backends implement them (see [`crate::pg`]); the [`crate::log`] module
//! decorates them.

use crate::error::DbResult;
use crate::value::SqlValue;
use std::future::Future;

/// A live database connection.
///
/// Connections are meant for sequential use by one task at a time.
pub trait Connection: Send {
    /// Plain statement type produced by [`Connection::create_statement`].
    type Statement: Statement;
    /// Parameterized statement type produced by [`Connection::prepare_statement`].
    type PreparedStatement: PreparedStatement;

    /// Create a statement for executing unparameterized SQL.
    fn create_statement(&mut self) -> impl Future<Output = DbResult<Self::Statement>> + Send;

    /// Precompile `sql` into a parameterized statement.
    fn prepare_statement(
        &mut self,
        sql: &str,
    ) -> impl Future<Output = DbResult<Self::PreparedStatement>> + Send;

    /// Commit the current transaction.
    fn commit(&mut self) -> impl Future<Output = DbResult<()>> + Send;

    /// Roll back the current transaction.
    fn rollback(&mut self) -> impl Future<Output = DbResult<()>> + Send;

    /// Switch auto-commit mode.
    fn set_auto_commit(&mut self, auto_commit: bool) -> impl Future<Output = DbResult<()>> + Send;

    /// Whether every statement commits on its own.
    fn auto_commit(&self) -> bool;

    /// Close the connection.
    fn close(&mut self) -> impl Future<Output = DbResult<()>> + Send;

    /// Whether [`Connection::close`] was called or the server went away.
    fn is_closed(&self) -> bool;
}

/// A statement executing SQL text passed per call.
pub trait Statement: Send {
    type Cursor: Cursor;

    /// Execute a query and return a cursor over its rows.
    fn execute_query(&mut self, sql: &str) -> impl Future<Output = DbResult<Self::Cursor>> + Send;

    /// Execute a mutation and return the number of affected rows.
    fn execute_update(&mut self, sql: &str) -> impl Future<Output = DbResult<u64>> + Send;

    fn close(&mut self) -> impl Future<Output = DbResult<()>> + Send;
}

/// A precompiled statement with ordinal parameters.
///
/// Ordinals are 1-based. Bindings persist across executions until replaced
/// or cleared, as with most drivers.
pub trait PreparedStatement: Send {
    type Cursor: Cursor;

    /// Bind `value` to the parameter at `ordinal`, replacing any prior binding.
    fn bind(&mut self, ordinal: usize, value: &SqlValue) -> DbResult<()>;

    /// Bind anything convertible into a [`SqlValue`].
    fn set<V: Into<SqlValue>>(&mut self, ordinal: usize, value: V) -> DbResult<()>
    where
        Self: Sized,
    {
        self.bind(ordinal, &value.into())
    }

    /// Drop every binding.
    fn clear_parameters(&mut self) -> DbResult<()>;

    /// Execute with the current bindings and return a cursor over the rows.
    fn execute_query(&mut self) -> impl Future<Output = DbResult<Self::Cursor>> + Send;

    /// Execute with the current bindings and return the number of affected rows.
    fn execute_update(&mut self) -> impl Future<Output = DbResult<u64>> + Send;

    fn close(&mut self) -> impl Future<Output = DbResult<()>> + Send;
}

/// A forward-only cursor over query results.
pub trait Cursor: Send {
    /// Move to the next row. Returns `false` once the rows are exhausted.
    fn advance(&mut self) -> impl Future<Output = DbResult<bool>> + Send;

    /// Read a column (0-based) of the current row.
    fn value(&self, column: usize) -> DbResult<SqlValue>;

    fn column_count(&self) -> usize;

    fn column_name(&self, column: usize) -> Option<&str>;

    /// Release the cursor. Further advances fail.
    fn close(&mut self) -> impl Future<Output = DbResult<()>> + Send;
}

/// Supplies live connections on demand.
pub trait DataSource: Send + Sync {
    type Connection: Connection;

    fn connect(&self) -> impl Future<Output = DbResult<Self::Connection>> + Send;
}
