//! Alert delivery clients for the liquidation sentinel.
//!
//! This crate provides:
//! - [`AlertPayload`]: the JSON document posted for every alert
//! - [`WebhookClient`]: HTTP webhook delivery

mod webhook;

pub use webhook::{AlertKind, AlertPayload, WebhookClient};
