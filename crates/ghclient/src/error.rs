//! Error types for organization API operations.
//!
//! Errors are categorized so callers can decide between falling back
//! (not found), surfacing (conflict) and stopping the whole run
//! (authentication).

use std::fmt;

/// Result type alias for organization API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The remote resource does not exist.
    NotFound,
    /// The remote side rejected the request (name collision, invalid shape).
    Conflict,
    /// The credential is invalid or lacks the required scope.
    Auth,
    /// Network-related errors.
    Network,
    /// Unexpected response shape.
    Format,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether no later call in the same run can succeed after this error.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::NotFound => "Resource not found",
            Self::Conflict => "Rejected by the platform",
            Self::Auth => "Authentication failed",
            Self::Network => "Network connectivity issue",
            Self::Format => "Unexpected API response",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::NotFound => "Check the organization name and that the resource exists",
            Self::Conflict => "Check the declaration for name collisions or invalid fields",
            Self::Auth => "Check the token and that it has organization admin scope",
            Self::Network => "Check your internet connection and try again",
            Self::Format => "The API may have changed; check for a newer version",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during organization API operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Remote resource absent (HTTP 404).
    #[error("not found: {resource}")]
    NotFound {
        /// Request or resource that was not found.
        resource: String,
    },

    /// Remote side rejected the request (HTTP 409/422).
    #[error("conflict on {resource}: {message}")]
    Conflict {
        /// Request that was rejected.
        resource: String,
        /// Error message.
        message: String,
    },

    /// Credential invalid or insufficient (HTTP 401/403).
    #[error("authentication failed (HTTP {status}) on {resource}")]
    AuthFailure {
        /// HTTP status code.
        status: u16,
        /// Request that was refused.
        resource: String,
    },

    /// HTTP request failed.
    #[error("HTTP request failed: {message}")]
    HttpError {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// Invalid response from API.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// Sealing a secret value failed.
    #[error("secret encryption failed: {0}")]
    Encryption(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::HttpError {
            message: message.into(),
            status,
        }
    }

    /// Classify an HTTP status code for a request.
    pub fn from_status(status: u16, resource: impl Into<String>) -> Self {
        let resource = resource.into();
        match status {
            401 | 403 => Self::AuthFailure { status, resource },
            404 => Self::NotFound { resource },
            409 | 422 => Self::Conflict {
                resource,
                message: format!("HTTP {status}"),
            },
            _ => Self::HttpError {
                message: format!("HTTP {status} on {resource}"),
                status: Some(status),
            },
        }
    }

    /// Convert a transport error, naming the request it came from.
    pub fn from_request(err: ureq::Error, resource: &str) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::from_status(code, resource),
            other => Self::HttpError {
                message: format!("{resource}: {other}"),
                status: None,
            },
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Conflict { .. } => ErrorCategory::Conflict,
            Error::AuthFailure { .. } => ErrorCategory::Auth,
            Error::HttpError { .. } => ErrorCategory::Network,
            Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::Encryption(_) | Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error must stop the whole run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.category().is_fatal()
    }

    /// Whether the remote resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::from_status(code, "request"),
            other => Self::HttpError {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_fatal() {
        assert!(ErrorCategory::Auth.is_fatal());
        assert!(!ErrorCategory::NotFound.is_fatal());
        assert!(!ErrorCategory::Conflict.is_fatal());
        assert!(!ErrorCategory::Network.is_fatal());
        assert!(!ErrorCategory::Format.is_fatal());
        assert!(!ErrorCategory::Other.is_fatal());
    }

    #[test]
    fn test_error_category_text() {
        assert!(!ErrorCategory::Auth.description().is_empty());
        assert!(!ErrorCategory::Conflict.advice().is_empty());
        assert!(format!("{}", ErrorCategory::Network).contains("Network"));
    }

    #[test]
    fn test_from_status_classification() {
        assert_eq!(
            Error::from_status(401, "GET /orgs/acme").category(),
            ErrorCategory::Auth
        );
        assert_eq!(
            Error::from_status(403, "GET /orgs/acme").category(),
            ErrorCategory::Auth
        );
        assert!(Error::from_status(404, "GET /orgs/acme/teams/x").is_not_found());
        assert_eq!(
            Error::from_status(409, "POST /orgs/acme/teams").category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            Error::from_status(422, "POST /orgs/acme/rulesets").category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            Error::from_status(502, "GET /orgs/acme").category(),
            ErrorCategory::Network
        );
    }

    #[test]
    fn test_auth_failure_is_fatal() {
        let err = Error::from_status(401, "GET /orgs/acme/actions/variables");
        assert!(err.is_fatal());
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn test_from_ureq_status_code() {
        let err: Error = ureq::Error::StatusCode(404).into();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_from_serde_error() {
        let serde_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: Error = serde_err.into();
        assert_eq!(err.category(), ErrorCategory::Format);
    }

    #[test]
    fn test_error_http_constructor() {
        let err = Error::http("connection reset", Some(502));
        match err {
            Error::HttpError { message, status } => {
                assert_eq!(message, "connection reset");
                assert_eq!(status, Some(502));
            }
            _ => panic!("Expected Error::HttpError"),
        }
    }
}
