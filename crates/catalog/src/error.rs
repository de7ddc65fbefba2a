//! Catalog error types.

use pdp_common::PdpError;
use thiserror::Error;

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Invalid connection parameters: {0}")]
    ConnectionParams(String),

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

/// Failures to reach the server are `Unavailable`; everything else the
/// database reports is a `Database` error.
impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => CatalogError::Unavailable(err.to_string()),
            other => CatalogError::Database(other),
        }
    }
}

impl From<CatalogError> for PdpError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Database(e) => PdpError::DatabaseError(e.to_string()),
            CatalogError::ConnectionParams(msg) => PdpError::ConnectionParams(msg),
            CatalogError::Unavailable(msg) => PdpError::ServiceUnavailable(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(err: sqlx::Error) -> u16 {
        PdpError::from(CatalogError::from(err)).http_status_code()
    }

    #[test]
    fn test_connection_failures_are_unavailable() {
        assert!(matches!(
            CatalogError::from(sqlx::Error::PoolTimedOut),
            CatalogError::Unavailable(_)
        ));
        assert_eq!(status(sqlx::Error::PoolTimedOut), 503);
        assert_eq!(status(sqlx::Error::PoolClosed), 503);

        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(status(sqlx::Error::Io(refused)), 503);
    }

    #[test]
    fn test_query_failures_are_database_errors() {
        assert!(matches!(
            CatalogError::from(sqlx::Error::RowNotFound),
            CatalogError::Database(_)
        ));
        assert_eq!(status(sqlx::Error::RowNotFound), 500);
        assert_eq!(status(sqlx::Error::ColumnNotFound("vars".to_string())), 500);
    }
}
