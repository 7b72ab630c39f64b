//! SQL logging by interception.
//!
//! [`instrument`] wraps a [`Connection`] so that every statement it hands out
//! logs its SQL (with bound parameters for prepared statements), every cursor
//! logs its row count and timings when closed, and commit/rollback are logged
//! with their duration. Wrapped calls return exactly what the underlying
//! resource returned, errors included.
//!
//! Lines are composed as
//!
//! ```text
//! <prefix> [<connection>][<statement>] <body> time: <ms>[ error: <error>]
//! ```
//!
//! and handed to a [`LogSink`]. Whether a resource gets wrapped at all is
//! decided when it is created: a statement created while logging was off
//! stays a pure pass-through for its whole life.
//!
//! # Example
//!
//! ```ignore
//! use dblog::log::{LogConfig, TracingSink, instrument};
//! use dblog::{Connection, Statement};
//!
//! let config = LogConfig::new(TracingSink::new()).cursors(false);
//! let mut conn = instrument(conn, config);
//! let mut stmt = conn.create_statement().await?;
//! stmt.execute_update("delete from sessions where expired").await?;
//! // jdbc [1][1] statement: delete from sessions where expired result: 3 time: 2
//! ```

mod config;
mod connection;
mod cursor;
mod dispatch;
mod identity;
mod prepared;
mod sink;
mod statement;

#[cfg(test)]
mod tests;

pub use config::{DEFAULT_PREFIX, LogConfig, LogSettings};
pub use connection::{InstrumentedConnection, LogDataSource};
pub use cursor::{CursorState, InstrumentedCursor};
pub use identity::{ConnectionId, IdentityAllocator, StatementId};
pub use prepared::InstrumentedPreparedStatement;
pub use sink::{BufferSink, FnSink, LogSink, StderrSink, TracingSink};
pub use statement::InstrumentedStatement;

use crate::resource::Connection;
use std::sync::Arc;

/// Wrap `conn` so that its activity is logged according to `config`.
pub fn instrument<C: Connection>(
    conn: C,
    config: impl Into<Arc<LogConfig>>,
) -> InstrumentedConnection<C> {
    InstrumentedConnection::new(conn, config)
}
