//! PostgreSQL implementation of the resource traits on `tokio-postgres`.
//!
//! A [`PgConnection`] owns one client. With auto-commit off, the first
//! statement after a commit or rollback opens a transaction (`BEGIN`) and
//! [`Connection::commit`] / [`Connection::rollback`] end it.

mod cursor;
mod statement;

#[cfg(test)]
mod tests;

pub use cursor::PgCursor;
pub use statement::{PgPreparedStatement, PgStatement};

use crate::error::{DbError, DbResult};
use crate::resource::{Connection, DataSource};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_postgres::{Client, NoTls};

/// Client plus the transaction bookkeeping statements share with their
/// connection.
pub(crate) struct Session {
    client: Client,
    auto_commit: AtomicBool,
    in_transaction: AtomicBool,
    closed: AtomicBool,
}

impl Session {
    fn new(client: Client, auto_commit: bool) -> Self {
        Self {
            client,
            auto_commit: AtomicBool::new(auto_commit),
            in_transaction: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn ensure_open(&self) -> DbResult<()> {
        if self.is_closed() {
            return Err(DbError::Closed("connection"));
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.client.is_closed()
    }

    /// Open a transaction before the first statement when auto-commit is off.
    pub(crate) async fn begin_if_needed(&self) -> DbResult<()> {
        if self.auto_commit.load(Ordering::Acquire) {
            return Ok(());
        }
        if self.in_transaction.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Err(e) = self.client.batch_execute("BEGIN").await {
            self.in_transaction.store(false, Ordering::Release);
            return Err(DbError::from_db_error(e));
        }
        Ok(())
    }

    /// Send `COMMIT` or `ROLLBACK` if a transaction is open.
    async fn finish(&self, command: &str) -> DbResult<()> {
        if !self.in_transaction.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        self.client
            .batch_execute(command)
            .await
            .map_err(DbError::from_db_error)
    }
}

/// A single PostgreSQL connection.
pub struct PgConnection {
    session: Arc<Session>,
}

impl PgConnection {
    /// Connect with `NoTls` using a PostgreSQL connection URL.
    ///
    /// The connection starts in auto-commit mode.
    pub async fn connect(database_url: &str) -> DbResult<Self> {
        let config: tokio_postgres::Config = database_url
            .parse()
            .map_err(|e: tokio_postgres::Error| DbError::Connection(e.to_string()))?;
        Self::connect_with_config(&config, true).await
    }

    /// Connect with `NoTls` using a parsed configuration.
    pub async fn connect_with_config(
        config: &tokio_postgres::Config,
        auto_commit: bool,
    ) -> DbResult<Self> {
        let (client, connection) = config
            .connect(NoTls)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(target: "dblog", error = %e, "postgres connection error");
            }
        });

        Ok(Self::from_client(client, auto_commit))
    }

    /// Wrap an already connected client.
    pub fn from_client(client: Client, auto_commit: bool) -> Self {
        Self {
            session: Arc::new(Session::new(client, auto_commit)),
        }
    }

    /// Whether a transaction is currently open on the server.
    pub fn in_transaction(&self) -> bool {
        self.session.in_transaction.load(Ordering::Acquire)
    }
}

impl Connection for PgConnection {
    type Statement = PgStatement;
    type PreparedStatement = PgPreparedStatement;

    async fn create_statement(&mut self) -> DbResult<PgStatement> {
        self.session.ensure_open()?;
        Ok(PgStatement::new(self.session.clone()))
    }

    async fn prepare_statement(&mut self, sql: &str) -> DbResult<PgPreparedStatement> {
        self.session.ensure_open()?;
        let statement = self
            .session
            .client()
            .prepare(sql)
            .await
            .map_err(DbError::from_db_error)?;
        Ok(PgPreparedStatement::new(self.session.clone(), statement))
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.session.ensure_open()?;
        self.session.finish("COMMIT").await
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.session.ensure_open()?;
        self.session.finish("ROLLBACK").await
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> DbResult<()> {
        self.session.ensure_open()?;
        // Turning auto-commit on commits whatever is pending.
        if auto_commit {
            self.session.finish("COMMIT").await?;
        }
        self.session.auto_commit.store(auto_commit, Ordering::Release);
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.session.auto_commit.load(Ordering::Acquire)
    }

    async fn close(&mut self) -> DbResult<()> {
        if self.session.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if self.session.client.is_closed() {
            return Ok(());
        }
        self.session.finish("ROLLBACK").await
    }

    fn is_closed(&self) -> bool {
        self.session.is_closed()
    }
}

/// Opens a new [`PgConnection`] per [`DataSource::connect`] call.
///
/// Connections start with auto-commit off unless configured otherwise.
#[derive(Clone)]
pub struct PgDataSource {
    config: tokio_postgres::Config,
    auto_commit: bool,
}

impl PgDataSource {
    pub fn new(database_url: &str) -> DbResult<Self> {
        let config = database_url
            .parse()
            .map_err(|e: tokio_postgres::Error| DbError::Config(e.to_string()))?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: tokio_postgres::Config) -> Self {
        Self {
            config,
            auto_commit: false,
        }
    }

    /// Set the auto-commit mode of new connections.
    pub fn auto_commit(mut self, auto_commit: bool) -> Self {
        self.auto_commit = auto_commit;
        self
    }
}

impl DataSource for PgDataSource {
    type Connection = PgConnection;

    async fn connect(&self) -> DbResult<PgConnection> {
        PgConnection::connect_with_config(&self.config, self.auto_commit).await
    }
}
