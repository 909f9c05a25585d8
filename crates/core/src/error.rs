//! Monitor error taxonomy.

use sentinel_chain::ChainError;
use thiserror::Error;

/// Failure raised by a monitoring component.
///
/// Each variant is contained to the smallest unit that can continue: a batch,
/// a message, a protocol version or a chain.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Deployment problem (missing endpoint, rejected subscription). Never retried.
    #[error("startup failed: {0}")]
    Startup(String),

    /// A health factor batch or historical log query failed.
    #[error("query failed: {0}")]
    TransientQuery(#[source] ChainError),

    /// A pushed message could not be decoded.
    #[error("undecodable message: {0}")]
    Decode(#[source] ChainError),

    /// The push subscription closed or could not be opened.
    #[error("connection lost: {0}")]
    Connection(#[source] ChainError),

    /// The checkpoint store failed.
    #[error("checkpoint store error: {0:#}")]
    Store(#[source] anyhow::Error),

    /// The account registry failed.
    #[error("account registry error: {0:#}")]
    Registry(#[source] anyhow::Error),
}

impl MonitorError {
    /// Whether the owning task must stop instead of backing off and retrying.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Startup(_))
    }

    /// Classify a failure to open a push subscription.
    pub(crate) fn from_subscribe(e: ChainError) -> Self {
        match e {
            ChainError::SubscriptionRejected(reason) => Self::Startup(format!(
                "subscription rejected: {reason}"
            )),
            other => Self::Connection(other),
        }
    }
}

pub type Result<T, E = MonitorError> = std::result::Result<T, E>;
