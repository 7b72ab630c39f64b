//! Error types for dblog

use thiserror::Error;

/// Result type alias for database resource operations
pub type DbResult<T> = Result<T, DbError>;

/// Errors raised by database resources.
///
/// Instrumented resources return these exactly as the wrapped resource
/// produced them.
#[derive(Debug, Error)]
pub enum DbError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// A parameter ordinal was rejected by the statement
    #[error("Invalid parameter ?{ordinal}: {message}")]
    InvalidParameter { ordinal: usize, message: String },

    /// A statement was executed with an ordinal left unbound
    #[error("Parameter ?{0} is not bound")]
    UnboundParameter(usize),

    /// A column index outside the cursor's row
    #[error("Invalid column index {0}")]
    InvalidColumn(usize),

    /// Column access while the cursor is not positioned on a row
    #[error("Cursor is not positioned on a row")]
    NoCurrentRow,

    /// Use of a resource after it was closed
    #[error("{0} is closed")]
    Closed(&'static str),

    /// Column type with no value mapping
    #[error("Unsupported column type '{type_name}' for column '{column}'")]
    UnsupportedType { column: String, type_name: String },

    /// A prepared-statement execution with nothing prepared
    #[error("No statement has been prepared")]
    NotPrepared,

    /// A failure annotated with the SQL that caused it
    #[error("last statement: {sql}")]
    Statement {
        sql: String,
        #[source]
        source: Box<DbError>,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl DbError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(ordinal: usize, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            ordinal,
            message: message.into(),
        }
    }

    /// Create an unsupported type error for a specific column
    pub fn unsupported_type(column: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            column: column.into(),
            type_name: type_name.into(),
        }
    }

    /// Attach the SQL text that was running when `source` occurred
    pub fn with_statement(sql: impl Into<String>, source: DbError) -> Self {
        Self::Statement {
            sql: sql.into(),
            source: Box::new(source),
        }
    }

    /// Check if this is a closed-resource error
    pub fn is_closed(&self) -> bool {
        match self {
            Self::Closed(_) => true,
            Self::Statement { source, .. } => source.is_closed(),
            _ => false,
        }
    }

    /// Returns the server-side SQLSTATE code, if the error came from Postgres.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Query(err) => err.as_db_error().map(|db| db.code().code()),
            Self::Statement { source, .. } => source.sql_state(),
            _ => None,
        }
    }

    /// The SQL attached by [`DbError::with_statement`], if any.
    pub fn statement(&self) -> Option<&str> {
        match self {
            Self::Statement { sql, .. } => Some(sql),
            _ => None,
        }
    }

    /// Convert a tokio_postgres error, keeping connection loss distinguishable
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if err.is_closed() {
            return Self::Connection(err.to_string());
        }
        Self::Query(err)
    }
}
