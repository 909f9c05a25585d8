//! `eth_subscribe` wire messages.
//!
//! Requests are plain JSON-RPC objects. The node answers the request with an
//! acknowledgment carrying either a subscription id or an `error` object, and
//! then pushes `eth_subscription` notifications whose `params.result` holds
//! the log.

use alloy::rpc::types::Log;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::endpoint::LogFilter;
use crate::error::{ChainError, Result};

/// Request id used for block header subscriptions.
pub const NEW_HEADS_REQUEST_ID: u64 = 1;

/// Request id used for log subscriptions.
pub const LOG_REQUEST_ID: u64 = 2;

/// Default subscription kind for log filters.
pub const DEFAULT_LOG_SUBSCRIPTION: &str = "getLogs";

/// Subscription request for new block headers.
pub fn new_heads_request() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": NEW_HEADS_REQUEST_ID,
        "method": "eth_subscribe",
        "params": ["newHeads"],
    })
}

/// Subscription request for logs matching `filter`.
pub fn log_subscription_request(kind: &str, filter: &LogFilter) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": LOG_REQUEST_ID,
        "method": "eth_subscribe",
        "params": [kind, {
            "address": filter.address,
            "topics": [filter.topic],
        }],
    })
}

/// Validate a subscription acknowledgment.
///
/// Returns the subscription id when the node supplied one.
pub fn parse_ack(raw: &str) -> Result<Option<String>> {
    let ack: Value = serde_json::from_str(raw).map_err(|e| {
        ChainError::SubscriptionRejected(format!("undecodable acknowledgment {raw}: {e}"))
    })?;

    if let Some(error) = ack.get("error") {
        return Err(ChainError::SubscriptionRejected(error.to_string()));
    }

    Ok(ack
        .get("result")
        .and_then(Value::as_str)
        .map(str::to_string))
}

#[derive(Debug, Deserialize)]
struct Notification {
    params: NotificationParams,
}

#[derive(Debug, Deserialize)]
struct NotificationParams {
    result: Value,
}

/// Decode a pushed `eth_subscription` notification into the log it carries.
pub fn decode_log_notification(raw: &str) -> Result<Log> {
    let notification: Notification = serde_json::from_str(raw)
        .map_err(|e| ChainError::Decode(format!("not a subscription notification: {e}")))?;

    serde_json::from_value(notification.params.result)
        .map_err(|e| ChainError::Decode(format!("notification does not carry a log: {e}")))
}
