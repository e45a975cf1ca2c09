//! Error types for the client.

use std::error::Error as StdError;
use std::fmt;

use dhstream_core::CoreError;
use thiserror::Error;

/// Failures of a single HTTP exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request URL could not be used.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to reach the server or read its reply.
    #[error("connection failed: {0}")]
    Connection(#[from] reqwest::Error),

    /// Server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Server answered 2xx with no body.
    #[error("empty response body")]
    EmptyBody,

    /// Body was not valid JSON.
    #[error("invalid JSON response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Broad classification of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transport or connection failure.
    NetworkError,
    /// Malformed request, rejected before or by the server.
    InvalidParameter,
    /// The server (or the controller) does not know the task.
    TaskNotFound,
    /// Vendor SDK failure reported through the backend.
    SdkError,
    /// Anything else.
    Unknown,
}

impl ErrorKind {
    /// Numeric code reported for this kind when the server gives none.
    pub fn code(self) -> i64 {
        match self {
            Self::NetworkError => -1,
            Self::InvalidParameter => -2,
            Self::TaskNotFound => -3,
            Self::SdkError => -4,
            Self::Unknown => -999,
        }
    }

    /// Classify a code from the response envelope.
    pub fn from_server_code(code: i64) -> Self {
        match code {
            -1 => Self::NetworkError,
            -2 | 400 => Self::InvalidParameter,
            -3 | 404 => Self::TaskNotFound,
            -4 => Self::SdkError,
            _ => Self::Unknown,
        }
    }
}

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Error surfaced by every API operation: a kind, a numeric code,
/// a human readable message and the underlying cause, if any.
#[derive(Debug)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub code: i64,
    pub message: String,
    source: Option<BoxError>,
}

impl ApiError {
    /// Error of `kind` carrying the kind's default code.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: kind.code(),
            message: message.into(),
            source: None,
        }
    }

    /// Bad caller input, code -2.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParameter, message)
    }

    /// No such task, code -3.
    pub fn task_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TaskNotFound, message)
    }

    /// Error reported in the response envelope.
    pub fn from_server(code: i64, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::from_server_code(code),
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Override the numeric code.
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Borrow the underlying cause.
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl StdError for ApiError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        let (kind, code, message) = match &err {
            TransportError::InvalidUrl(url) => (
                ErrorKind::InvalidParameter,
                ErrorKind::InvalidParameter.code(),
                format!("invalid server URL: {}", url),
            ),
            TransportError::Connection(e) => (
                ErrorKind::NetworkError,
                ErrorKind::NetworkError.code(),
                format!("network request failed: {}", e),
            ),
            TransportError::Status { status, .. } => (
                ErrorKind::NetworkError,
                i64::from(*status),
                format!("HTTP error: {}", status),
            ),
            TransportError::EmptyBody => (
                ErrorKind::Unknown,
                ErrorKind::Unknown.code(),
                "response body is empty".to_string(),
            ),
            TransportError::Decode(e) => (
                ErrorKind::Unknown,
                ErrorKind::Unknown.code(),
                format!("failed to parse response: {}", e),
            ),
        };
        Self {
            kind,
            code,
            message,
            source: Some(Box::new(err)),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let kind = match &err {
            CoreError::TaskNotFound(_) => ErrorKind::TaskNotFound,
            CoreError::InvalidInput(_) | CoreError::InvalidStateTransition { .. } => {
                ErrorKind::InvalidParameter
            }
            CoreError::MissingField(_) => ErrorKind::Unknown,
        };
        Self::new(kind, err.to_string()).with_source(err)
    }
}
