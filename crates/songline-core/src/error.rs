//! Common error type for page fetches and binary downloads

use std::io;

/// Error from a single fetch (page GET, HEAD probe, or streamed download).
///
/// Transient variants are absorbed by the transport's retry policy; whatever
/// reaches the caller is reported per item and never aborts a phase.
#[derive(Debug)]
pub enum FetchError {
    /// HTTP error with optional status code (`None` = no response at all)
    Http {
        status: Option<u16>,
        message: String,
    },
    /// Connect, request or body read timed out
    Timeout(String),
    /// Local I/O error
    Io(io::Error),
    /// HTTP client could not be constructed
    Build(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Timeout(message) => write!(f, "timeout: {message}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Build(message) => write!(f, "client error: {message}"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl FetchError {
    /// Classify a reqwest error, separating timeouts from other failures
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Timeout(e.to_string());
        }
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Io(e) => e.kind() == io::ErrorKind::TimedOut,
            _ => false,
        }
    }

    /// Failures worth another attempt regardless of status policy.
    ///
    /// Status-code retries are decided by [`crate::RetryPolicy`]; this only
    /// covers failures that produced no response.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Http { status: None, .. } => true,
            Self::Http { status: Some(_), .. } => false,
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            Self::Build(_) => false,
        }
    }
}

impl From<io::Error> for FetchError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// First `max_chars` characters of an error message, for per-item reports.
pub fn excerpt(message: impl std::fmt::Display, max_chars: usize) -> String {
    message.to_string().chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_err(status: u16) -> FetchError {
        FetchError::Http {
            status: Some(status),
            message: "test".to_string(),
        }
    }

    #[test]
    fn display_http_with_status() {
        assert_eq!(format!("{}", http_err(404)), "HTTP 404: test");
    }

    #[test]
    fn display_http_without_status() {
        let err = FetchError::Http {
            status: None,
            message: "connection refused".to_string(),
        };
        assert_eq!(format!("{err}"), "HTTP error: connection refused");
    }

    #[test]
    fn status_errors_are_not_transient() {
        assert!(!http_err(503).is_transient());
        assert!(!http_err(404).is_transient());
    }

    #[test]
    fn connection_failure_is_transient() {
        let err = FetchError::Http {
            status: None,
            message: "reset".to_string(),
        };
        assert!(err.is_transient());
        assert!(FetchError::Timeout("slow".into()).is_transient());
    }

    #[test]
    fn io_timeout_counts_as_timeout() {
        let err = FetchError::Io(io::Error::new(io::ErrorKind::TimedOut, "stall"));
        assert!(err.is_timeout());
        assert!(err.is_transient());
    }

    #[test]
    fn io_storage_full_not_transient() {
        let err = FetchError::Io(io::Error::new(io::ErrorKind::StorageFull, "disk full"));
        assert!(!err.is_transient());
        assert!(!err.is_timeout());
    }

    #[test]
    fn excerpt_truncates_by_chars() {
        assert_eq!(excerpt("abcdef", 3), "abc");
        assert_eq!(excerpt("ab", 50), "ab");
        // Multi-byte characters are never split
        assert_eq!(excerpt("ééé", 2), "éé");
    }
}
