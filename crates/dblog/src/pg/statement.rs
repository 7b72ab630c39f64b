use super::Session;
use super::cursor::PgCursor;
use crate::error::{DbError, DbResult};
use crate::resource::{PreparedStatement, Statement};
use crate::value::SqlValue;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// Executes SQL text given per call.
pub struct PgStatement {
    session: Arc<Session>,
    closed: bool,
}

impl PgStatement {
    pub(super) fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            closed: false,
        }
    }

    fn ensure_open(&self) -> DbResult<()> {
        if self.closed {
            return Err(DbError::Closed("statement"));
        }
        self.session.ensure_open()
    }
}

impl Statement for PgStatement {
    type Cursor = PgCursor;

    async fn execute_query(&mut self, sql: &str) -> DbResult<PgCursor> {
        self.ensure_open()?;
        self.session.begin_if_needed().await?;
        let client = self.session.client();
        // Prepared first so the cursor knows its columns before the first row.
        let statement = client.prepare(sql).await.map_err(DbError::from_db_error)?;
        let stream = client
            .query_raw(&statement, std::iter::empty::<&(dyn ToSql + Sync)>())
            .await
            .map_err(DbError::from_db_error)?;
        Ok(PgCursor::new(stream, statement.columns()))
    }

    async fn execute_update(&mut self, sql: &str) -> DbResult<u64> {
        self.ensure_open()?;
        self.session.begin_if_needed().await?;
        self.session
            .client()
            .execute(sql, &[])
            .await
            .map_err(DbError::from_db_error)
    }

    async fn close(&mut self) -> DbResult<()> {
        self.closed = true;
        Ok(())
    }
}

/// A server-side prepared statement with `$n` placeholders.
///
/// Every placeholder must be bound before execution; bindings persist
/// across executions until replaced or cleared.
pub struct PgPreparedStatement {
    session: Arc<Session>,
    statement: tokio_postgres::Statement,
    params: Vec<Option<SqlValue>>,
    closed: bool,
}

impl PgPreparedStatement {
    pub(super) fn new(session: Arc<Session>, statement: tokio_postgres::Statement) -> Self {
        let params = vec![None; statement.params().len()];
        Self {
            session,
            statement,
            params,
            closed: false,
        }
    }

    /// Number of placeholders in the statement.
    pub fn parameter_count(&self) -> usize {
        self.params.len()
    }

    fn ensure_open(&self) -> DbResult<()> {
        if self.closed {
            return Err(DbError::Closed("statement"));
        }
        self.session.ensure_open()
    }

    fn bound(&self) -> DbResult<Vec<&(dyn ToSql + Sync)>> {
        self.params
            .iter()
            .enumerate()
            .map(|(i, slot)| match slot {
                Some(value) => Ok(value as &(dyn ToSql + Sync)),
                None => Err(DbError::UnboundParameter(i + 1)),
            })
            .collect()
    }
}

impl PreparedStatement for PgPreparedStatement {
    type Cursor = PgCursor;

    fn bind(&mut self, ordinal: usize, value: &SqlValue) -> DbResult<()> {
        let count = self.params.len();
        let slot = ordinal
            .checked_sub(1)
            .and_then(|i| self.params.get_mut(i))
            .ok_or_else(|| {
                DbError::invalid_parameter(ordinal, format!("statement has {count} parameters"))
            })?;
        *slot = Some(value.clone());
        Ok(())
    }

    fn clear_parameters(&mut self) -> DbResult<()> {
        self.params.iter_mut().for_each(|slot| *slot = None);
        Ok(())
    }

    async fn execute_query(&mut self) -> DbResult<PgCursor> {
        self.ensure_open()?;
        let params = self.bound()?;
        self.session.begin_if_needed().await?;
        let stream = self
            .session
            .client()
            .query_raw(&self.statement, params.iter().copied())
            .await
            .map_err(DbError::from_db_error)?;
        Ok(PgCursor::new(stream, self.statement.columns()))
    }

    async fn execute_update(&mut self) -> DbResult<u64> {
        self.ensure_open()?;
        let params = self.bound()?;
        self.session.begin_if_needed().await?;
        self.session
            .client()
            .execute(&self.statement, &params)
            .await
            .map_err(DbError::from_db_error)
    }

    async fn close(&mut self) -> DbResult<()> {
        self.closed = true;
        Ok(())
    }
}
