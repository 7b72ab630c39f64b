//! A holder for the connection, statements and cursor of a unit of work.
//!
//! [`Db`] opens its connection on first use with auto-commit off and keeps
//! one plain statement for every unparameterized call. Only the latest
//! prepared statement and the latest cursor are kept; creating a new one
//! closes the previous. Failures carry the SQL that was running.
//!
//! ```ignore
//! use dblog::{Db, Cursor, PreparedStatement};
//!
//! let mut db = Db::new(source);
//! db.execute_update("delete from staging").await?;
//! db.prepare("insert into staging (id) values ($1)").await?.set(1, 7)?;
//! db.execute_prepared_update().await?;
//! db.conn().await?.commit().await?;
//! db.close().await;
//! ```

use crate::error::{DbError, DbResult};
use crate::resource::{Connection, Cursor, DataSource, PreparedStatement, Statement};
use crate::value::SqlValue;

type Conn<D> = <D as DataSource>::Connection;
type Plain<D> = <Conn<D> as Connection>::Statement;
type Prepared<D> = <Conn<D> as Connection>::PreparedStatement;

/// The cursor type kept by a [`Db`] over data source `D`.
pub type DbCursor<D> =
    EitherCursor<<Plain<D> as Statement>::Cursor, <Prepared<D> as PreparedStatement>::Cursor>;

/// A cursor from either a plain or a prepared statement.
pub enum EitherCursor<A, B> {
    Plain(A),
    Prepared(B),
}

impl<A: Cursor, B: Cursor> Cursor for EitherCursor<A, B> {
    async fn advance(&mut self) -> DbResult<bool> {
        match self {
            Self::Plain(c) => c.advance().await,
            Self::Prepared(c) => c.advance().await,
        }
    }

    fn value(&self, column: usize) -> DbResult<SqlValue> {
        match self {
            Self::Plain(c) => c.value(column),
            Self::Prepared(c) => c.value(column),
        }
    }

    fn column_count(&self) -> usize {
        match self {
            Self::Plain(c) => c.column_count(),
            Self::Prepared(c) => c.column_count(),
        }
    }

    fn column_name(&self, column: usize) -> Option<&str> {
        match self {
            Self::Plain(c) => c.column_name(column),
            Self::Prepared(c) => c.column_name(column),
        }
    }

    async fn close(&mut self) -> DbResult<()> {
        match self {
            Self::Plain(c) => c.close().await,
            Self::Prepared(c) => c.close().await,
        }
    }
}

/// Lazily opened resources of one data source.
///
/// Call [`Db::close`] when done: it closes the cursor, the prepared
/// statement, the plain statement and finally rolls back and closes the
/// connection. Commit explicitly through [`Db::conn`] to keep changes.
pub struct Db<D: DataSource> {
    source: D,
    conn: Option<Conn<D>>,
    statement: Option<Plain<D>>,
    prepared: Option<Prepared<D>>,
    cursor: Option<DbCursor<D>>,
    last: Option<String>,
}

impl<D: DataSource> Db<D> {
    pub fn new(source: D) -> Self {
        Self {
            source,
            conn: None,
            statement: None,
            prepared: None,
            cursor: None,
            last: None,
        }
    }

    pub fn source(&self) -> &D {
        &self.source
    }

    /// The connection, opened with auto-commit off on first call.
    pub async fn conn(&mut self) -> DbResult<&mut Conn<D>> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                let mut conn = self.source.connect().await?;
                conn.set_auto_commit(false).await?;
                conn
            }
        };
        Ok(self.conn.insert(conn))
    }

    /// The plain statement, if one has been created.
    pub fn statement(&mut self) -> Option<&mut Plain<D>> {
        self.statement.as_mut()
    }

    /// The latest prepared statement.
    pub fn prepared(&mut self) -> Option<&mut Prepared<D>> {
        self.prepared.as_mut()
    }

    /// The latest cursor.
    pub fn cursor(&mut self) -> Option<&mut DbCursor<D>> {
        self.cursor.as_mut()
    }

    /// SQL of the latest execute or prepare, until its resource is closed.
    pub fn last_statement(&self) -> Option<&str> {
        self.last.as_deref()
    }

    async fn plain(&mut self) -> DbResult<&mut Plain<D>> {
        let statement = match self.statement.take() {
            Some(statement) => statement,
            None => self.conn().await?.create_statement().await?,
        };
        Ok(self.statement.insert(statement))
    }

    fn annotate(&self, err: DbError) -> DbError {
        match &self.last {
            Some(sql) => DbError::with_statement(sql.clone(), err),
            None => err,
        }
    }

    /// Run `sql` as an update through the shared plain statement.
    pub async fn execute_update(&mut self, sql: &str) -> DbResult<u64> {
        self.last = Some(sql.to_string());
        let result = match self.plain().await {
            Ok(statement) => statement.execute_update(sql).await,
            Err(e) => Err(e),
        };
        result.map_err(|e| self.annotate(e))
    }

    /// Run `sql` as a query, closing the previous cursor first.
    pub async fn execute_query(&mut self, sql: &str) -> DbResult<&mut DbCursor<D>> {
        self.close_cursor().await;
        self.last = Some(sql.to_string());
        let result = match self.plain().await {
            Ok(statement) => statement.execute_query(sql).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(cursor) => Ok(self.cursor.insert(EitherCursor::Plain(cursor))),
            Err(e) => Err(self.annotate(e)),
        }
    }

    /// Prepare `sql`, closing the previous prepared statement first.
    pub async fn prepare(&mut self, sql: &str) -> DbResult<&mut Prepared<D>> {
        self.close_prepared().await;
        self.last = Some(sql.to_string());
        let result = match self.conn().await {
            Ok(conn) => conn.prepare_statement(sql).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(prepared) => Ok(self.prepared.insert(prepared)),
            Err(e) => Err(self.annotate(e)),
        }
    }

    /// Execute the latest prepared statement as an update.
    pub async fn execute_prepared_update(&mut self) -> DbResult<u64> {
        let result = match self.prepared.as_mut() {
            Some(prepared) => prepared.execute_update().await,
            None => Err(DbError::NotPrepared),
        };
        result.map_err(|e| self.annotate(e))
    }

    /// Execute the latest prepared statement as a query, closing the
    /// previous cursor first.
    pub async fn execute_prepared_query(&mut self) -> DbResult<&mut DbCursor<D>> {
        self.close_cursor().await;
        let result = match self.prepared.as_mut() {
            Some(prepared) => prepared.execute_query().await,
            None => Err(DbError::NotPrepared),
        };
        match result {
            Ok(cursor) => Ok(self.cursor.insert(EitherCursor::Prepared(cursor))),
            Err(e) => Err(self.annotate(e)),
        }
    }

    /// Close the latest cursor. The last statement is kept for the
    /// statement that produced it.
    pub async fn close_cursor(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            if let Err(e) = cursor.close().await {
                tracing::warn!(target: "dblog", error = %e, "failed to close cursor");
            }
        }
    }

    pub async fn close_prepared(&mut self) {
        if let Some(mut prepared) = self.prepared.take() {
            if let Err(e) = prepared.close().await {
                tracing::warn!(target: "dblog", error = %e, "failed to close prepared statement");
            }
            self.last = None;
        }
    }

    pub async fn close_statement(&mut self) {
        if let Some(mut statement) = self.statement.take() {
            if let Err(e) = statement.close().await {
                tracing::warn!(target: "dblog", error = %e, "failed to close statement");
            }
            self.last = None;
        }
    }

    /// Roll back and close the connection.
    pub async fn close_connection(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            if let Err(e) = conn.rollback().await {
                tracing::warn!(target: "dblog", error = %e, "failed to roll back before close");
            }
            if !conn.is_closed() {
                if let Err(e) = conn.close().await {
                    tracing::warn!(target: "dblog", error = %e, "failed to close connection");
                }
            }
            self.last = None;
        }
    }

    /// Close everything, newest first.
    pub async fn close(&mut self) {
        self.close_cursor().await;
        self.close_prepared().await;
        self.close_statement().await;
        self.close_connection().await;
    }
}

impl<D: DataSource> Drop for Db<D> {
    fn drop(&mut self) {
        if self.conn.is_some() {
            tracing::warn!(target: "dblog", "Db dropped without close; connection left open");
        }
    }
}
