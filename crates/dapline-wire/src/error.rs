//! DAP error types.

use thiserror::Error;

/// Errors from the framing and session layers.
#[derive(Debug, Error)]
pub enum DapError {
    /// Malformed header, bad Content-Length, invalid JSON body, or a body
    /// that is not a recognizable DAP message.
    #[error("framing error: {0}")]
    Framing(String),

    /// A local message could not be serialized.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// A response arrived for a seq with no pending request.
    #[error("unsolicited response for request_seq {request_seq}")]
    UnsolicitedResponse {
        /// The `request_seq` carried by the response.
        request_seq: i64,
    },

    /// The adapter answered with `success = false`.
    #[error("adapter rejected {command}: {message}")]
    Adapter {
        /// The command that failed.
        command: String,
        /// The adapter's error message.
        message: String,
    },

    /// A response body did not have the expected shape.
    #[error("adapter sent invalid response: {0}")]
    InvalidResponse(String),

    /// The request's timeout expired before a response arrived.
    #[error("request timed out: {command}")]
    Timeout {
        /// The command that timed out.
        command: String,
    },

    /// The request was cancelled locally.
    #[error("request cancelled: {command}")]
    Cancelled {
        /// The command that was cancelled.
        command: String,
    },

    /// The connection was closed or reached end of stream.
    #[error("connection closed")]
    ConnectionClosed,

    /// Transport-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DapError {
    /// Whether the connection is still usable after this error.
    ///
    /// Only a closed stream or an I/O failure on it is fatal; everything
    /// else fails a single frame or a single request.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, DapError::ConnectionClosed | DapError::Io(_))
    }
}
