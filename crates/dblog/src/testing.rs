//! An in-memory backend for exercising the resource traits without a server.

use crate::error::{DbError, DbResult};
use crate::resource::{Connection, Cursor, DataSource, PreparedStatement, Statement};
use crate::value::SqlValue;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub(crate) struct FakeConn {
    pub(crate) rows: Vec<Vec<SqlValue>>,
    pub(crate) fail_executes: bool,
    events: Arc<Mutex<Vec<String>>>,
    auto_commit: bool,
    closed: bool,
}

impl FakeConn {
    pub(crate) fn with_rows(n: i64) -> Self {
        Self {
            rows: (1..=n)
                .map(|i| vec![SqlValue::Int(i), SqlValue::Text(format!("row{i}"))])
                .collect(),
            ..Self::default()
        }
    }

    /// Transaction and update events seen by this connection and its statements.
    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail_executes: true,
            ..Self::default()
        }
    }
}

impl Connection for FakeConn {
    type Statement = FakeStatement;
    type PreparedStatement = FakePrepared;

    async fn create_statement(&mut self) -> DbResult<FakeStatement> {
        Ok(FakeStatement { conn: self.clone() })
    }

    async fn prepare_statement(&mut self, sql: &str) -> DbResult<FakePrepared> {
        if sql.contains("syntax error") {
            return Err(DbError::Other(format!("cannot prepare: {sql}")));
        }
        Ok(FakePrepared {
            conn: self.clone(),
            bound: BTreeMap::new(),
        })
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.record("commit".to_string());
        Ok(())
    }

    async fn rollback(&mut self) -> DbResult<()> {
        if self.fail_executes {
            return Err(DbError::Other("rollback refused".to_string()));
        }
        self.record("rollback".to_string());
        Ok(())
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> DbResult<()> {
        self.record(format!("auto_commit: {auto_commit}"));
        self.auto_commit = auto_commit;
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    async fn close(&mut self) -> DbResult<()> {
        self.record("close".to_string());
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

pub(crate) struct FakeStatement {
    conn: FakeConn,
}

impl Statement for FakeStatement {
    type Cursor = FakeCursor;

    async fn execute_query(&mut self, sql: &str) -> DbResult<FakeCursor> {
        if self.conn.fail_executes || sql.contains("missing_table") {
            return Err(DbError::Other(
                "relation \"missing_table\" does not exist".to_string(),
            ));
        }
        Ok(FakeCursor::new(self.conn.rows.clone()))
    }

    async fn execute_update(&mut self, sql: &str) -> DbResult<u64> {
        if self.conn.fail_executes {
            return Err(DbError::Other("update failed".to_string()));
        }
        self.conn.record(format!("update: {sql}"));
        Ok(1)
    }

    async fn close(&mut self) -> DbResult<()> {
        Ok(())
    }
}

pub(crate) struct FakePrepared {
    conn: FakeConn,
    pub(crate) bound: BTreeMap<usize, SqlValue>,
}

impl PreparedStatement for FakePrepared {
    type Cursor = FakeCursor;

    fn bind(&mut self, ordinal: usize, value: &SqlValue) -> DbResult<()> {
        if !(1..=2).contains(&ordinal) {
            return Err(DbError::invalid_parameter(ordinal, "statement has 2 parameters"));
        }
        self.bound.insert(ordinal, value.clone());
        Ok(())
    }

    fn clear_parameters(&mut self) -> DbResult<()> {
        self.bound.clear();
        Ok(())
    }

    async fn execute_query(&mut self) -> DbResult<FakeCursor> {
        if self.conn.fail_executes {
            return Err(DbError::Other("query failed".to_string()));
        }
        Ok(FakeCursor::new(self.conn.rows.clone()))
    }

    async fn execute_update(&mut self) -> DbResult<u64> {
        if self.conn.fail_executes {
            return Err(DbError::Other("update failed".to_string()));
        }
        Ok(1)
    }

    async fn close(&mut self) -> DbResult<()> {
        Ok(())
    }
}

pub(crate) struct FakeCursor {
    rows: Vec<Vec<SqlValue>>,
    next: usize,
    current: Option<usize>,
    closed: bool,
}

impl FakeCursor {
    fn new(rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            rows,
            next: 0,
            current: None,
            closed: false,
        }
    }
}

impl Cursor for FakeCursor {
    async fn advance(&mut self) -> DbResult<bool> {
        if self.closed {
            return Err(DbError::Closed("cursor"));
        }
        if self.next < self.rows.len() {
            self.current = Some(self.next);
            self.next += 1;
            Ok(true)
        } else {
            self.current = None;
            Ok(false)
        }
    }

    fn value(&self, column: usize) -> DbResult<SqlValue> {
        let row = self.current.ok_or(DbError::NoCurrentRow)?;
        self.rows[row]
            .get(column)
            .cloned()
            .ok_or(DbError::InvalidColumn(column))
    }

    fn column_count(&self) -> usize {
        2
    }

    fn column_name(&self, column: usize) -> Option<&str> {
        ["id", "name"].get(column).copied()
    }

    async fn close(&mut self) -> DbResult<()> {
        self.closed = true;
        Ok(())
    }
}

/// Hands out clones of `conn`, which share its event log.
#[derive(Clone, Default)]
pub(crate) struct FakeSource {
    pub(crate) conn: FakeConn,
}

impl DataSource for FakeSource {
    type Connection = FakeConn;

    async fn connect(&self) -> DbResult<FakeConn> {
        Ok(self.conn.clone())
    }
}
