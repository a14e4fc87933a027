//! Error types for the orchestrator and scheduler clients.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for remote client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// The request never produced an HTTP response.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, TLS failure.
    #[error("failed to connect to {url}: {message}")]
    ConnectionFailed { url: String, message: String },

    /// The underlying transport gave up waiting.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// Anything else, including a malformed base address.
    #[error("HTTP request failed: {0}")]
    Request(String),
}

impl TransportError {
    /// Classify a reqwest failure for `url`.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
            }
        } else if err.is_connect() {
            TransportError::ConnectionFailed {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// A response arrived but is not what the caller can use.
#[derive(Debug, Error)]
pub enum ShapeError {
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("invalid JSON body: {0}")]
    InvalidJson(String),

    #[error("response did not acknowledge the request")]
    MissingAck,

    #[error("response is missing field `{0}`")]
    MissingField(&'static str),
}

/// Any failure of a remote call.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// Failures of the on-disk preference store.
#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("failed to write preferences to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode preferences: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::ConnectionFailed {
            url: "http://localhost:8001/query".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to connect to http://localhost:8001/query: connection refused"
        );

        let err = TransportError::Timeout {
            url: "http://localhost:8001/query".to_string(),
        };
        assert_eq!(err.to_string(), "request to http://localhost:8001/query timed out");
    }

    #[test]
    fn test_shape_error_display() {
        assert_eq!(ShapeError::Status(500).to_string(), "unexpected HTTP status 500");
        assert_eq!(
            ShapeError::MissingAck.to_string(),
            "response did not acknowledge the request"
        );
        assert_eq!(
            ShapeError::MissingField("running").to_string(),
            "response is missing field `running`"
        );
    }

    #[test]
    fn test_client_error_is_transparent() {
        let err: ClientError = ShapeError::Status(502).into();
        assert!(matches!(err, ClientError::Shape(ShapeError::Status(502))));
        assert_eq!(err.to_string(), "unexpected HTTP status 502");

        let err: ClientError = TransportError::Request("builder error".to_string()).into();
        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(err.to_string(), "HTTP request failed: builder error");
    }
}
