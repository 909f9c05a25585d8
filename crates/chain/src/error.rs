//! Errors raised by the chain endpoint adapter.

use thiserror::Error;

/// Failure talking to a chain endpoint.
#[derive(Debug, Error)]
pub enum ChainError {
    /// An endpoint URL could not be parsed.
    #[error("invalid endpoint url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The JSON-RPC transport failed (HTTP error, node error response).
    #[error("rpc transport error: {0}")]
    Transport(String),

    /// A contract call reverted or returned undecodable data.
    #[error("contract call failed: {0}")]
    Contract(String),

    /// A batched query returned a different number of results than requested.
    #[error("batched query returned {got} results for {expected} inputs")]
    LengthMismatch { expected: usize, got: usize },

    /// The node refused the push subscription.
    #[error("subscription rejected: {0}")]
    SubscriptionRejected(String),

    /// The push channel was closed by the remote side.
    #[error("subscription connection closed")]
    ConnectionClosed,

    /// Low-level WebSocket failure.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// A pushed message or log could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for ChainError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match e {
            WsError::ConnectionClosed | WsError::AlreadyClosed => Self::ConnectionClosed,
            other => Self::WebSocket(other.to_string()),
        }
    }
}

pub type Result<T, E = ChainError> = std::result::Result<T, E>;
