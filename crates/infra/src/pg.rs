//! Shared sqlx helpers.

use stratum_core::StoreError;

/// Map a sqlx error into a [`StoreError`], keeping the driver's message and
/// SQLSTATE so the HTTP boundary can classify connectivity failures.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code() {
                Some(code) => StoreError::with_code(msg, code.as_ref()),
                None => StoreError::backend(msg),
            }
        }
        // Display for these already reads "pool timed out while waiting for an open connection".
        sqlx::Error::PoolTimedOut => StoreError::backend(format!("{} in {}", err, operation)),
        sqlx::Error::PoolClosed => StoreError::backend(format!("connection pool closed in {}", operation)),
        sqlx::Error::Io(io_err) => StoreError::backend(format!("connection error in {}: {}", operation, io_err)),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(format!("{} in {}", err, operation))
        }
        _ => StoreError::backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
