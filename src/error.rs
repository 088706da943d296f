//! Unified error types for tgexport.
//!
//! [`ExportError`] is the single error type returned by library operations.
//! The two external seams each carry their own error enum so callers can
//! decide which failures are tolerable:
//!
//! - [`ClientError`] - failures reported by the messaging-protocol client
//! - [`SinkError`] - failures reported by the database sink
//!
//! # Error Handling Philosophy
//!
//! Most per-record and per-group failures are logged and skipped by the
//! exporters. Only authentication and connection failures
//! ([`ClientError::is_fatal`]) and sink failures terminate a run.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A specialized [`Result`] type for tgexport operations.
///
/// # Example
///
/// ```rust
/// use tgexport::error::Result;
///
/// fn my_function() -> Result<usize> {
///     Ok(0)
/// }
/// ```
pub type Result<T> = std::result::Result<T, ExportError>;

/// The error type for all tgexport operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExportError {
    /// An I/O error occurred while creating output directories or files.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Writing a CSV record failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON parsing/serialization error (graph payloads, sink rows).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to load an account snapshot.
    #[error("Failed to load snapshot{}: {source}", path.as_ref().map(|p| format!(" (file: {})", p.display())).unwrap_or_default())]
    Snapshot {
        /// The underlying parse error
        #[source]
        source: serde_json::Error,
        /// The snapshot path, if available
        path: Option<PathBuf>,
    },

    /// The messaging-protocol client reported an error.
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// The database sink reported an error.
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Invalid date in configuration.
    #[error("Invalid date '{input}'. Expected format: {expected}")]
    InvalidDate {
        /// The invalid date string that was provided
        input: String,
        /// Expected format description
        expected: &'static str,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A statistics graph payload could not be turned into rows.
    #[error("Invalid graph data: {0}")]
    InvalidGraph(String),
}

/// Errors reported by a [`ChatClient`](crate::client::ChatClient).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// The account lacks the rights for this request (e.g. admin required).
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The server rejected the request.
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// Server error code
        code: i32,
        /// Server error message
        message: String,
    },

    /// The requested object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The session is not authorized.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The connection to the server failed.
    #[error("connection error: {0}")]
    Connection(String),
}

impl ClientError {
    /// Creates an RPC error.
    pub fn rpc(code: i32, message: impl Into<String>) -> Self {
        ClientError::Rpc {
            code,
            message: message.into(),
        }
    }

    /// Returns `true` if this is a permission error.
    pub fn is_permission(&self) -> bool {
        matches!(self, ClientError::PermissionDenied(_))
    }

    /// Returns `true` for failures that must terminate the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::Unauthorized(_) | ClientError::Connection(_)
        )
    }
}

/// Errors reported by a [`Sink`](crate::sink::Sink).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SinkError {
    /// The HTTP request to the database failed.
    #[cfg(feature = "clickhouse")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The database answered with a non-success status.
    #[error("database returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, usually the server's exception text
        body: String,
    },

    /// A response row could not be decoded.
    #[error("failed to decode row: {0}")]
    Decode(#[from] serde_json::Error),

    /// The sink could not be configured.
    #[error("sink configuration error: {0}")]
    Config(String),

    /// A lock around in-memory tables was poisoned.
    #[error("in-memory tables are poisoned")]
    Poisoned,
}

// ============================================================================
// Convenience constructors
// ============================================================================

impl ExportError {
    /// Creates a snapshot load error.
    pub fn snapshot(source: serde_json::Error, path: Option<PathBuf>) -> Self {
        ExportError::Snapshot { source, path }
    }

    /// Creates an invalid date error.
    pub fn invalid_date(input: impl Into<String>) -> Self {
        ExportError::InvalidDate {
            input: input.into(),
            expected: "YYYY-MM-DD or RFC 3339",
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        ExportError::InvalidConfig(message.into())
    }

    /// Creates an invalid graph data error.
    pub fn invalid_graph(message: impl Into<String>) -> Self {
        ExportError::InvalidGraph(message.into())
    }

    /// Returns `true` if this is an IO error.
    pub fn is_io(&self) -> bool {
        matches!(self, ExportError::Io(_))
    }

    /// Returns `true` if this wraps a client error.
    pub fn is_client(&self) -> bool {
        matches!(self, ExportError::Client(_))
    }

    /// Returns `true` if this wraps a sink error.
    pub fn is_sink(&self) -> bool {
        matches!(self, ExportError::Sink(_))
    }

    /// Returns `true` if this is a date-related error.
    pub fn is_invalid_date(&self) -> bool {
        matches!(self, ExportError::InvalidDate { .. })
    }

    /// Returns the client error, if this wraps one.
    pub fn as_client(&self) -> Option<&ClientError> {
        match self {
            ExportError::Client(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err = ExportError::from(io_err);
        assert!(err.is_io());
        assert_eq!(err.to_string(), "IO error: file not found");
    }

    #[test]
    fn test_client_error_display() {
        let err = ExportError::from(ClientError::rpc(400, "CHAT_ADMIN_REQUIRED"));
        assert!(err.is_client());
        assert_eq!(
            err.to_string(),
            "Client error: RPC error 400: CHAT_ADMIN_REQUIRED"
        );
    }

    #[test]
    fn test_client_error_classification() {
        assert!(ClientError::PermissionDenied("admin".into()).is_permission());
        assert!(!ClientError::rpc(420, "FLOOD_WAIT").is_permission());

        assert!(ClientError::Connection("reset".into()).is_fatal());
        assert!(ClientError::Unauthorized("no session".into()).is_fatal());
        assert!(!ClientError::PermissionDenied("admin".into()).is_fatal());
        assert!(!ClientError::NotFound("topic".into()).is_fatal());
    }

    #[test]
    fn test_invalid_date_display() {
        let err = ExportError::invalid_date("not-a-date");
        assert!(err.is_invalid_date());
        assert!(err.to_string().contains("not-a-date"));
        assert!(err.to_string().contains("YYYY-MM-DD"));
    }

    #[test]
    fn test_snapshot_error_includes_path() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ExportError::snapshot(source, Some(PathBuf::from("/tmp/account.json")));
        assert!(err.to_string().contains("/tmp/account.json"));
    }

    #[test]
    fn test_sink_status_display() {
        let err = ExportError::from(SinkError::Status {
            status: 500,
            body: "Code: 60. Table does not exist".into(),
        });
        assert!(err.is_sink());
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_as_client() {
        let err = ExportError::from(ClientError::PermissionDenied("x".into()));
        assert!(err.as_client().is_some_and(ClientError::is_permission));
        assert!(ExportError::invalid_config("x").as_client().is_none());
    }
}
