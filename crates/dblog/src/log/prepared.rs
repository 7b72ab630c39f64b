use super::config::LogConfig;
use super::cursor::{CursorTap, InstrumentedCursor};
use super::dispatch::{
    Interceptor, Invocation, LogLine, Operation, dispatch, dispatch_sync, dispatch_update,
};
use super::identity::{ConnectionId, StatementId};
use crate::error::DbResult;
use crate::resource::PreparedStatement;
use crate::value::SqlValue;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

/// Bound parameter values awaiting the next execution, ordered by ordinal.
#[derive(Debug, Default)]
struct ParameterBuffer {
    values: BTreeMap<usize, String>,
}

impl ParameterBuffer {
    fn record(&mut self, ordinal: usize, value: &SqlValue) {
        // Ordinals are 1-based; anything else is not a parameter position.
        if ordinal == 0 {
            return;
        }
        self.values.insert(ordinal, value.to_string());
    }

    /// ` ?1:a ?2:b`, or empty when nothing is bound.
    fn render(&self) -> String {
        let mut out = String::new();
        for (ordinal, value) in &self.values {
            let _ = write!(out, " ?{ordinal}:{value}");
        }
        out
    }
}

pub(crate) struct PreparedTap {
    config: Arc<LogConfig>,
    connection: ConnectionId,
    id: StatementId,
    sql: String,
    params: ParameterBuffer,
}

impl PreparedTap {
    pub(crate) fn new(
        config: Arc<LogConfig>,
        connection: ConnectionId,
        id: StatementId,
        sql: &str,
    ) -> Self {
        Self {
            config,
            connection,
            id,
            sql: sql.to_string(),
            params: ParameterBuffer::default(),
        }
    }

    fn cursor_tap(&self) -> Option<CursorTap> {
        self.config
            .cursors_enabled()
            .then(|| CursorTap::new(self.config.clone(), self.connection, self.id))
    }
}

impl Interceptor for PreparedTap {
    fn after(&mut self, call: &Invocation<'_>) {
        match call.op {
            Operation::BindParameter { ordinal, value } => {
                if self.config.statements_enabled() {
                    self.params.record(ordinal, value);
                }
            }
            Operation::ExecuteQuery { sql: None } | Operation::ExecuteUpdate { sql: None } => {
                if self.config.statements_enabled() {
                    let mut line =
                        LogLine::new(self.config.line_prefix(), Some(self.connection), Some(self.id))
                            .field("statement", &self.sql)
                            .fragment("params", &self.params.render());
                    if let Some(rows) = call.affected {
                        line = line.field("result", rows);
                    }
                    self.config.emit(&line.finish(call.elapsed, call.error));
                }
                self.params.values.clear();
            }
            _ => {}
        }
    }
}

/// A parameterized statement that logs its SQL together with the values
/// bound for each execution.
///
/// Bound values are remembered per ordinal (the last bind wins) and the
/// memory is cleared after every execution, successful or not.
pub struct InstrumentedPreparedStatement<P> {
    inner: P,
    tap: Option<PreparedTap>,
}

impl<P: PreparedStatement> InstrumentedPreparedStatement<P> {
    pub(crate) fn new(inner: P, tap: Option<PreparedTap>) -> Self {
        Self { inner, tap }
    }

    /// Identity assigned at creation, if statement logging was on then.
    pub fn id(&self) -> Option<StatementId> {
        self.tap.as_ref().map(|tap| tap.id)
    }

    /// SQL text the statement was prepared from, if it is being logged.
    pub fn sql(&self) -> Option<&str> {
        self.tap.as_ref().map(|tap| tap.sql.as_str())
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn into_inner(self) -> P {
        self.inner
    }

    #[cfg(test)]
    pub(crate) fn buffered(&self) -> String {
        self.tap
            .as_ref()
            .map(|tap| tap.params.render())
            .unwrap_or_default()
    }
}

impl<P: PreparedStatement> PreparedStatement for InstrumentedPreparedStatement<P> {
    type Cursor = InstrumentedCursor<P::Cursor>;

    fn bind(&mut self, ordinal: usize, value: &SqlValue) -> DbResult<()> {
        dispatch_sync(
            &mut self.tap,
            Operation::BindParameter { ordinal, value },
            || self.inner.bind(ordinal, value),
        )
    }

    fn clear_parameters(&mut self) -> DbResult<()> {
        dispatch_sync(&mut self.tap, Operation::Other("clear_parameters"), || {
            self.inner.clear_parameters()
        })
    }

    async fn execute_query(&mut self) -> DbResult<Self::Cursor> {
        let cursor = dispatch(
            &mut self.tap,
            Operation::ExecuteQuery { sql: None },
            self.inner.execute_query(),
        )
        .await?;
        let tap = self.tap.as_ref().and_then(PreparedTap::cursor_tap);
        Ok(InstrumentedCursor::new(cursor, tap))
    }

    async fn execute_update(&mut self) -> DbResult<u64> {
        dispatch_update(
            &mut self.tap,
            Operation::ExecuteUpdate { sql: None },
            self.inner.execute_update(),
        )
        .await
    }

    async fn close(&mut self) -> DbResult<()> {
        dispatch(&mut self.tap, Operation::Close, self.inner.close()).await
    }
}
