use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use sqlx::Row;

/// Reads a timestamp column stored either as INTEGER milliseconds or as a
/// SQLite `DATETIME` string (`CURRENT_TIMESTAMP` defaults).
pub(crate) fn parse_timestamp<'r, R>(
    row: &'r R,
    column_name: &'r str,
) -> Result<DateTime<Utc>, sqlx::Error>
where
    R: Row,
    &'r str: sqlx::ColumnIndex<R>,
    i64: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    String: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
{
    if let Ok(timestamp_ms) = row.try_get::<i64, _>(column_name) {
        return DateTime::from_timestamp_millis(timestamp_ms)
            .ok_or_else(|| column_decode_error(column_name, "Invalid timestamp value"));
    }

    if let Ok(datetime_str) = row.try_get::<String, _>(column_name) {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&datetime_str) {
            return Ok(dt.with_timezone(&Utc));
        }
        return NaiveDateTime::parse_from_str(&datetime_str, "%Y-%m-%d %H:%M:%S")
            .map(|naive| naive.and_utc())
            .map_err(|e| column_decode_error(column_name, &e.to_string()));
    }

    Err(column_decode_error(
        column_name,
        "Could not parse as INTEGER or DATETIME",
    ))
}

/// Deserializes a JSON document stored in a TEXT column.
pub(crate) fn parse_json<'r, R, T>(row: &'r R, column_name: &'r str) -> Result<T, sqlx::Error>
where
    R: Row,
    &'r str: sqlx::ColumnIndex<R>,
    String: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    T: DeserializeOwned,
{
    let json: String = row.try_get(column_name)?;
    serde_json::from_str(&json).map_err(|e| sqlx::Error::ColumnDecode {
        index: column_name.to_string(),
        source: Box::new(e),
    })
}

pub(crate) fn column_decode_error(column_name: &str, message: &str) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column_name.to_string(),
        source: Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            message.to_string(),
        )),
    }
}
