//! Shared Diesel error mapping for adapters with basic query semantics.

use tracing::debug;

use super::pool::PoolError;

/// Map pool errors into an adapter-specific connection error constructor.
pub fn map_basic_pool_error<E, C>(error: PoolError, connection: C) -> E
where
    C: FnOnce(String) -> E,
{
    connection(error.message().to_owned())
}

/// Map common Diesel error variants into query/connection constructors.
///
/// Closed connections map to connection errors; everything else is a query
/// error carrying the database's own message.
pub fn map_basic_diesel_error<E, Q, C>(error: diesel::result::Error, query: Q, connection: C) -> E
where
    Q: Fn(String) -> E,
    C: Fn(String) -> E,
{
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
            connection(format!("database connection closed: {}", info.message()))
        }
        DieselError::DatabaseError(_, info) => query(format!("database error: {}", info.message())),
        DieselError::NotFound => query("record not found".to_owned()),
        other => query(other.to_string()),
    }
}
