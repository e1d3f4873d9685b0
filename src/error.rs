//! Error types for dialchat.
//!
//! Every failure a chat turn can hit is represented by [`Error`].  Errors are
//! surfaced to the interactive loop unchanged; nothing in this crate retries.

use std::error;
use std::fmt;
use std::io;
use std::str::Utf8Error;
use std::sync::Arc;

/// The main error type for dialchat.
#[derive(Clone, Debug)]
pub enum Error {
    /// The server answered with a non-success status.
    Http {
        /// HTTP status code.
        status: u16,
        /// Raw response body, unparsed.
        body: String,
    },

    /// A successful response carried no choices.
    NoChoices,

    /// The streamed response failed before it completed.
    Streaming {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// A response body did not have the expected shape.
    MalformedResponse {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// No credential was configured.
    Authentication {
        /// Human-readable error message.
        message: String,
    },

    /// Configuration could not be loaded or is invalid.
    Configuration {
        /// Human-readable error message.
        message: String,
    },

    /// The request timed out.
    Timeout {
        /// Human-readable error message.
        message: String,
        /// Duration of the timeout in seconds.
        duration: Option<f64>,
    },

    /// The request was cancelled by the user.
    Abort {
        /// Human-readable error message.
        message: String,
    },

    /// Could not connect to the endpoint.
    Connection {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Error during JSON serialization or deserialization.
    Serialization {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// I/O error.
    Io {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Arc<io::Error>,
    },

    /// HTTP client error.
    HttpClient {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// A URL parsing or manipulation error.
    Url {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<url::ParseError>,
    },
}

impl Error {
    /// Creates a new HTTP status error.
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Error::Http {
            status,
            body: body.into(),
        }
    }

    /// Creates a new no-choices error.
    pub fn no_choices() -> Self {
        Error::NoChoices
    }

    /// Creates a new streaming error.
    pub fn streaming(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Streaming {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new malformed-response error.
    pub fn malformed_response(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::MalformedResponse {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Error::Authentication {
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new timeout error.
    pub fn timeout(message: impl Into<String>, duration: Option<f64>) -> Self {
        Error::Timeout {
            message: message.into(),
            duration,
        }
    }

    /// Creates a new abort error.
    pub fn abort(message: impl Into<String>) -> Self {
        Error::Abort {
            message: message.into(),
        }
    }

    /// Creates a new connection error.
    pub fn connection(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Connection {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Creates a new HTTP client error.
    pub fn http_client(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::HttpClient {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new URL error.
    pub fn url(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            source,
        }
    }

    /// Converts a `reqwest` send failure into the matching variant.
    pub(crate) fn from_send(err: reqwest::Error, timeout: std::time::Duration) -> Self {
        if err.is_timeout() {
            Error::timeout(
                format!("Request timed out: {err}"),
                Some(timeout.as_secs_f64()),
            )
        } else if err.is_connect() {
            Error::connection(format!("Connection error: {err}"), Some(Box::new(err)))
        } else {
            Error::http_client(format!("Request failed: {err}"), Some(Box::new(err)))
        }
    }

    /// Returns true if this is a non-success HTTP status.
    pub fn is_http(&self) -> bool {
        matches!(self, Error::Http { .. })
    }

    /// Returns true if the response had no choices.
    pub fn is_no_choices(&self) -> bool {
        matches!(self, Error::NoChoices)
    }

    /// Returns true if this error happened while streaming.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Error::Streaming { .. })
    }

    /// Returns true if the response body had an unexpected shape.
    pub fn is_malformed_response(&self) -> bool {
        matches!(self, Error::MalformedResponse { .. })
    }

    /// Returns true if this error is related to authentication.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Error::Authentication { .. })
    }

    /// Returns true if this error is a configuration error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }

    /// Returns true if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Returns true if this error is an abort.
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::Abort { .. })
    }

    /// Returns true if this error is a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }

    /// Returns the status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body associated with this error, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            Error::Http { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http { status, body } => {
                write!(f, "HTTP {status}: {body}")
            }
            Error::NoChoices => {
                write!(f, "No choices in response found")
            }
            Error::Streaming { message, .. } => {
                write!(f, "Streaming error: {message}")
            }
            Error::MalformedResponse { message, .. } => {
                write!(f, "Malformed response: {message}")
            }
            Error::Authentication { message } => {
                write!(f, "Authentication error: {message}")
            }
            Error::Configuration { message } => {
                write!(f, "Configuration error: {message}")
            }
            Error::Timeout { message, duration } => {
                if let Some(duration) = duration {
                    write!(f, "Timeout error: {message} ({duration} seconds)")
                } else {
                    write!(f, "Timeout error: {message}")
                }
            }
            Error::Abort { message } => {
                write!(f, "Request aborted: {message}")
            }
            Error::Connection { message, .. } => {
                write!(f, "Connection error: {message}")
            }
            Error::Serialization { message, .. } => {
                write!(f, "Serialization error: {message}")
            }
            Error::Io { message, .. } => {
                write!(f, "I/O error: {message}")
            }
            Error::HttpClient { message, .. } => {
                write!(f, "HTTP client error: {message}")
            }
            Error::Url { message, .. } => {
                write!(f, "URL error: {message}")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Streaming { source, .. }
            | Error::MalformedResponse { source, .. }
            | Error::Connection { source, .. }
            | Error::Serialization { source, .. }
            | Error::HttpClient { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Io { source, .. } => Some(source),
            Error::Url { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(format!("URL parse error: {err}"), Some(err))
    }
}

impl From<Utf8Error> for Error {
    fn from(err: Utf8Error) -> Self {
        Error::streaming(format!("UTF-8 error: {err}"), Some(Box::new(err)))
    }
}

/// A specialized Result type for dialchat operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_preserves_status_and_body() {
        let err = Error::http(401, r#"{"error":"unauthorized"}"#);
        assert!(err.is_http());
        assert_eq!(err.status_code(), Some(401));
        assert_eq!(err.body(), Some(r#"{"error":"unauthorized"}"#));
        assert_eq!(err.to_string(), r#"HTTP 401: {"error":"unauthorized"}"#);
    }

    #[test]
    fn no_choices_display() {
        let err = Error::no_choices();
        assert!(err.is_no_choices());
        assert_eq!(err.status_code(), None);
        assert_eq!(err.to_string(), "No choices in response found");
    }

    #[test]
    fn json_error_keeps_source() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::streaming("bad event", Some(Box::new(json_err)));
        assert!(err.is_streaming());
        assert!(error::Error::source(&err).is_some());
    }

    #[test]
    fn utf8_error_is_streaming() {
        let bytes = vec![0xff, 0xfe];
        let utf8 = std::str::from_utf8(&bytes).unwrap_err();
        let err: Error = utf8.into();
        assert!(err.is_streaming());
    }
}
