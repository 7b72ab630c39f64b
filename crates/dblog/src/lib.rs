//! # dblog
//!
//! Transparent SQL activity logging for database connections.
//!
//! ## Features
//!
//! - **Drop-in wrapping**: an instrumented connection implements the same
//!   [`Connection`] trait as the one it wraps and returns its results untouched
//! - **Statement logging**: every executed SQL string, with bound parameters
//!   for prepared statements and the affected-row count for updates
//! - **Cursor statistics**: row count, time to first row and time to last row
//! - **Transaction logging**: commit and rollback with their duration
//! - **Pluggable sinks**: stderr, `tracing`, in-memory, or any pair of closures
//! - **PostgreSQL backend** on `tokio-postgres`, and a SQL script runner
//! - **[`Db`]**: a lazily connecting holder for one unit of work that names
//!   the failing SQL in its errors
//!
//! ## Usage
//!
//! ```ignore
//! use dblog::{Connection, PreparedStatement, PgDataSource, LogDataSource};
//! use dblog::log::{LogConfig, StderrSink};
//! use dblog::resource::DataSource;
//!
//! let source = LogDataSource::new(
//!     PgDataSource::new("postgres://postgres@localhost/app")?,
//!     LogConfig::new(StderrSink::new()),
//! );
//! let mut conn = source.connect().await?;
//! let mut insert = conn.prepare_statement("insert into items (id, name) values ($1, $2)").await?;
//! insert.set(1, 42)?;
//! insert.set(2, "widget")?;
//! insert.execute_update().await?;
//! conn.commit().await?;
//! // jdbc [1][1] statement: insert into items (id, name) values ($1, $2) params: ?1:42 ?2:widget result: 1 time: 1
//! // jdbc [1] commit time: 2
//! ```

pub mod db;
pub mod error;
pub mod log;
pub mod pg;
pub mod resource;
pub mod script;
pub mod value;

#[cfg(test)]
mod testing;

pub use db::{Db, DbCursor, EitherCursor};
pub use error::{DbError, DbResult};
pub use log::{
    BufferSink, InstrumentedConnection, LogConfig, LogDataSource, LogSettings, LogSink,
    StderrSink, TracingSink, instrument,
};
pub use pg::{PgConnection, PgDataSource};
pub use resource::{Connection, Cursor, DataSource, PreparedStatement, Statement};
pub use script::Script;
pub use value::SqlValue;
