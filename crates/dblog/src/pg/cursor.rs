use crate::error::{DbError, DbResult};
use crate::resource::Cursor;
use crate::value::SqlValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures_util::StreamExt;
use rust_decimal::Decimal;
use std::pin::Pin;
use tokio_postgres::types::Type;
use tokio_postgres::{Column, Row, RowStream};
use uuid::Uuid;

/// Streams rows from the server one [`Cursor::advance`] at a time.
pub struct PgCursor {
    stream: Option<Pin<Box<RowStream>>>,
    current: Option<Row>,
    columns: Vec<(String, Type)>,
}

impl PgCursor {
    pub(super) fn new(stream: RowStream, columns: &[Column]) -> Self {
        Self {
            stream: Some(Box::pin(stream)),
            current: None,
            columns: columns
                .iter()
                .map(|c| (c.name().to_string(), c.type_().clone()))
                .collect(),
        }
    }

    /// Server-reported affected-row count, once the stream is exhausted.
    pub fn rows_affected(&self) -> Option<u64> {
        self.stream.as_ref().and_then(|s| s.rows_affected())
    }
}

impl Cursor for PgCursor {
    async fn advance(&mut self) -> DbResult<bool> {
        let stream = self.stream.as_mut().ok_or(DbError::Closed("cursor"))?;
        match stream.next().await {
            Some(Ok(row)) => {
                self.current = Some(row);
                Ok(true)
            }
            Some(Err(e)) => {
                self.current = None;
                Err(DbError::from_db_error(e))
            }
            None => {
                self.current = None;
                Ok(false)
            }
        }
    }

    fn value(&self, column: usize) -> DbResult<SqlValue> {
        if self.stream.is_none() {
            return Err(DbError::Closed("cursor"));
        }
        let row = self.current.as_ref().ok_or(DbError::NoCurrentRow)?;
        if column >= row.len() {
            return Err(DbError::InvalidColumn(column));
        }
        decode(row, column)
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_name(&self, column: usize) -> Option<&str> {
        self.columns.get(column).map(|(name, _)| name.as_str())
    }

    async fn close(&mut self) -> DbResult<()> {
        self.current = None;
        self.stream = None;
        Ok(())
    }
}

fn decode(row: &Row, idx: usize) -> DbResult<SqlValue> {
    let column = &row.columns()[idx];
    let value = match *column.type_() {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.into(),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.into(),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.into(),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.into(),
        Type::OID => row.try_get::<_, Option<u32>>(idx)?.into(),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx)?.into(),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.into(),
        Type::NUMERIC => row.try_get::<_, Option<Decimal>>(idx)?.into(),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            row.try_get::<_, Option<String>>(idx)?.into()
        }
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx)?.into(),
        Type::TIMESTAMPTZ => row.try_get::<_, Option<DateTime<Utc>>>(idx)?.into(),
        Type::TIMESTAMP => row.try_get::<_, Option<NaiveDateTime>>(idx)?.into(),
        Type::DATE => row.try_get::<_, Option<NaiveDate>>(idx)?.into(),
        Type::UUID => row.try_get::<_, Option<Uuid>>(idx)?.into(),
        Type::JSON | Type::JSONB => row.try_get::<_, Option<serde_json::Value>>(idx)?.into(),
        ref other => return Err(DbError::unsupported_type(column.name(), other.name())),
    };
    Ok(value)
}
