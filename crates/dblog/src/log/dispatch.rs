//! The call-wrapping skeleton shared by every interceptor.
//!
//! One intercepted call runs as:
//! 1. `before` with the operation (may record state, never alters the call),
//! 2. the delegated call, timed,
//! 3. `after` exactly once with elapsed time and the captured failure,
//! 4. the delegated result handed back unchanged.
//!
//! Re-wrapping of returned resources happens in the interceptor method after
//! dispatch returns, so a failure reaches the caller untouched.

use super::identity::{ConnectionId, StatementId};
use crate::error::{DbError, DbResult};
use crate::value::SqlValue;
use std::fmt::{self, Write as _};
use std::future::Future;
use std::time::{Duration, Instant};

/// Operations the interceptors tell apart. Everything else is `Other`.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Operation<'a> {
    CreateStatement,
    PrepareStatement,
    /// `sql` is `None` for parameterized statements.
    ExecuteQuery { sql: Option<&'a str> },
    ExecuteUpdate { sql: Option<&'a str> },
    BindParameter { ordinal: usize, value: &'a SqlValue },
    Commit,
    Rollback,
    Advance,
    Close,
    Other(&'static str),
}

impl Operation<'_> {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Operation::CreateStatement => "create_statement",
            Operation::PrepareStatement => "prepare_statement",
            Operation::ExecuteQuery { .. } => "execute_query",
            Operation::ExecuteUpdate { .. } => "execute_update",
            Operation::BindParameter { .. } => "bind",
            Operation::Commit => "commit",
            Operation::Rollback => "rollback",
            Operation::Advance => "advance",
            Operation::Close => "close",
            Operation::Other(name) => *name,
        }
    }
}

/// What `after` learns about a finished call.
#[derive(Debug)]
pub(crate) struct Invocation<'a> {
    pub op: Operation<'a>,
    pub elapsed: Duration,
    /// Rows affected, for successful updates.
    pub affected: Option<u64>,
    pub error: Option<&'a DbError>,
}

/// Per-resource hooks around delegated calls.
pub(crate) trait Interceptor {
    fn before(&mut self, _op: &Operation<'_>) {}

    fn after(&mut self, call: &Invocation<'_>);
}

/// A resource handed out while logging was off carries no interceptor.
impl<I: Interceptor> Interceptor for Option<I> {
    fn before(&mut self, op: &Operation<'_>) {
        if let Some(inner) = self {
            inner.before(op);
        }
    }

    fn after(&mut self, call: &Invocation<'_>) {
        if let Some(inner) = self {
            inner.after(call);
        }
    }
}

pub(crate) async fn dispatch<I, T, F>(tap: &mut I, op: Operation<'_>, call: F) -> DbResult<T>
where
    I: Interceptor,
    F: Future<Output = DbResult<T>>,
{
    tap.before(&op);
    let started = Instant::now();
    let result = call.await;
    complete(tap, op, started.elapsed(), &result, None);
    result
}

/// Like [`dispatch`], reporting the affected-row count to `after`.
pub(crate) async fn dispatch_update<I, F>(tap: &mut I, op: Operation<'_>, call: F) -> DbResult<u64>
where
    I: Interceptor,
    F: Future<Output = DbResult<u64>>,
{
    tap.before(&op);
    let started = Instant::now();
    let result = call.await;
    let affected = result.as_ref().ok().copied();
    complete(tap, op, started.elapsed(), &result, affected);
    result
}

pub(crate) fn dispatch_sync<I, T, F>(tap: &mut I, op: Operation<'_>, call: F) -> DbResult<T>
where
    I: Interceptor,
    F: FnOnce() -> DbResult<T>,
{
    tap.before(&op);
    let started = Instant::now();
    let result = call();
    complete(tap, op, started.elapsed(), &result, None);
    result
}

fn complete<I: Interceptor, T>(
    tap: &mut I,
    op: Operation<'_>,
    elapsed: Duration,
    result: &DbResult<T>,
    affected: Option<u64>,
) {
    tap.after(&Invocation {
        op,
        elapsed,
        affected,
        error: result.as_ref().err(),
    });
}

/// Builder for one log line: `<prefix> [conn][stmt] <body> time: <ms>[ error: <e>]`.
pub(crate) struct LogLine {
    buf: String,
}

impl LogLine {
    pub(crate) fn new(
        prefix: &str,
        connection: Option<ConnectionId>,
        statement: Option<StatementId>,
    ) -> Self {
        let mut buf = String::with_capacity(128);
        buf.push_str(prefix);
        match (connection, statement) {
            (Some(c), Some(s)) => {
                let _ = write!(buf, " [{c}][{s}]");
            }
            (Some(c), None) => {
                let _ = write!(buf, " [{c}]");
            }
            _ => {}
        }
        Self { buf }
    }

    /// Append ` <word>`.
    pub(crate) fn word(mut self, word: &str) -> Self {
        self.buf.push(' ');
        self.buf.push_str(word);
        self
    }

    /// Append ` <name>: <value>`.
    pub(crate) fn field(mut self, name: &str, value: impl fmt::Display) -> Self {
        let _ = write!(self.buf, " {name}: {value}");
        self
    }

    /// Append ` <name>:` followed directly by `fragment`.
    pub(crate) fn fragment(mut self, name: &str, fragment: &str) -> Self {
        self.buf.push(' ');
        self.buf.push_str(name);
        self.buf.push(':');
        self.buf.push_str(fragment);
        self
    }

    pub(crate) fn finish(mut self, elapsed: Duration, error: Option<&DbError>) -> String {
        let _ = write!(self.buf, " time: {}", elapsed.as_millis());
        if let Some(err) = error {
            let _ = write!(self.buf, " error: {err}");
        }
        self.buf
    }
}
