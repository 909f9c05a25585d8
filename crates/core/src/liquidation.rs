//! Liquidation handling shared by catch-up and live monitoring.

use tracing::{debug, info};

use crate::context::ChainContext;
use crate::error::{MonitorError, Result};
use crate::notifier::{deliver, Alert};
use crate::types::LiquidationEvent;

/// Notify if the liquidated account is tracked.
///
/// Returns whether an alert was raised. Safe to call twice for the same event;
/// duplicates only repeat the alert.
pub async fn handle_liquidation(ctx: &ChainContext, event: LiquidationEvent) -> Result<bool> {
    let tracked = ctx
        .registry
        .find_tracked(ctx.chain, event.version, event.user)
        .await
        .map_err(MonitorError::Registry)?;

    let Some(account) = tracked else {
        debug!(
            chain = %ctx.chain,
            version = %event.version,
            user = %event.user,
            block = event.block_number,
            "Liquidation of untracked account"
        );
        return Ok(false);
    };

    info!(
        chain = %ctx.chain,
        version = %event.version,
        account = %account.address,
        block = event.block_number,
        tx = %event.call.tx_hash,
        "Tracked account liquidated"
    );

    deliver(ctx.notifier.as_ref(), &Alert::Liquidation { account, event }).await;
    Ok(true)
}
