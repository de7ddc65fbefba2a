//! Error types for the data portal services.

use thiserror::Error;

/// Result type alias using PdpError.
pub type PdpResult<T> = Result<T, PdpError>;

/// Primary error type for portal operations.
#[derive(Debug, Error)]
pub enum PdpError {
    // === Request Errors ===
    #[error("Requested extension not supported: {0}")]
    UnsupportedFormat(String),

    #[error("{selected} stations selected; at most {limit} may be downloaded at once")]
    TooManyStations { selected: usize, limit: usize },

    // === Storage Errors ===
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Invalid connection parameters: {0}")]
    ConnectionParams(String),

    // === Infrastructure Errors ===
    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl PdpError {
    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            PdpError::UnsupportedFormat(_) => 400,

            PdpError::TooManyStations { .. } => 413,

            PdpError::ServiceUnavailable(_) => 503,

            _ => 500,
        }
    }

    /// Short machine-readable code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            PdpError::UnsupportedFormat(_) => "UnsupportedFormat",
            PdpError::TooManyStations { .. } => "ResponseTooLarge",
            PdpError::DatabaseError(_) => "DatabaseError",
            PdpError::ServiceUnavailable(_) => "ServiceUnavailable",
            _ => "NoApplicableCode",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(PdpError::UnsupportedFormat("xls".into()).http_status_code(), 400);
        assert_eq!(
            PdpError::TooManyStations { selected: 20, limit: 10 }.http_status_code(),
            413
        );
        assert_eq!(PdpError::DatabaseError("down".into()).http_status_code(), 500);
        assert_eq!(
            PdpError::ServiceUnavailable("pool".into()).http_status_code(),
            503
        );
    }

    #[test]
    fn test_display_includes_detail() {
        let err = PdpError::UnsupportedFormat("unsupported_extension".to_string());
        assert_eq!(
            err.to_string(),
            "Requested extension not supported: unsupported_extension"
        );
        assert_eq!(err.code(), "UnsupportedFormat");
    }
}
