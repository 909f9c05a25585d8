//! Per-version supervision of catch-up and live monitoring.
//!
//! ```text
//! Reconciling -> Subscribing -> Live -> Disconnected -> Reconciling ...
//! ```
//!
//! Live monitoring only starts after a successful catch-up, and a second
//! catch-up runs once the subscription is acknowledged so blocks mined while
//! subscribing are covered too.

use std::fmt;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, warn};

use sentinel_chain::RawMessageStream;

use crate::error::MonitorError;
use crate::live::LiveMonitor;
use crate::reconciler::Reconciler;

/// Doubling delay between `initial` and `max`.
///
/// `initial` is at least `MIN_RECONNECT_DELAY` so retries always back off.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

/// Lower bound for the first reconnect delay.
pub(crate) const MIN_RECONNECT_DELAY: Duration = Duration::from_millis(1);

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.max(MIN_RECONNECT_DELAY);
        let max = max.max(initial);
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait now; the following one doubles.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Supervisor phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionState {
    Reconciling,
    Subscribing,
    Live,
    Disconnected,
}

impl fmt::Display for VersionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Reconciling => "reconciling",
            Self::Subscribing => "subscribing",
            Self::Live => "live",
            Self::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

enum Step {
    Reconciling,
    Subscribing,
    Live(RawMessageStream),
    Disconnected,
}

impl Step {
    fn state(&self) -> VersionState {
        match self {
            Self::Reconciling => VersionState::Reconciling,
            Self::Subscribing => VersionState::Subscribing,
            Self::Live(_) => VersionState::Live,
            Self::Disconnected => VersionState::Disconnected,
        }
    }
}

/// Drives one pool version for the lifetime of the process.
pub struct VersionSupervisor {
    reconciler: Reconciler,
    live: LiveMonitor,
    backoff: Backoff,
    label: String,
}

impl VersionSupervisor {
    pub fn new(reconciler: Reconciler, live: LiveMonitor, backoff: Backoff, label: impl Into<String>) -> Self {
        Self {
            reconciler,
            live,
            backoff,
            label: label.into(),
        }
    }

    /// Run until a fatal error, which is returned.
    pub async fn run(mut self) -> MonitorError {
        let mut step = Step::Reconciling;

        loop {
            let state = step.state();
            step = match step {
                Step::Reconciling => match self.reconciler.run().await {
                    Ok(_) => Step::Subscribing,
                    Err(e) if e.is_fatal() => return e,
                    Err(e) => {
                        let delay = self.backoff.next_delay();
                        warn!(
                            monitor = %self.label,
                            state = %state,
                            error = %e,
                            retry_ms = delay.as_millis() as u64,
                            "Catch-up failed, retrying"
                        );
                        sleep(delay).await;
                        Step::Reconciling
                    }
                },

                Step::Subscribing => match self.live.subscribe().await {
                    // Close the window between the first catch-up and the
                    // subscription becoming active.
                    Ok(messages) => match self.reconciler.run().await {
                        Ok(_) => Step::Live(messages),
                        Err(e) if e.is_fatal() => return e,
                        Err(e) => {
                            warn!(
                                monitor = %self.label,
                                state = %state,
                                error = %e,
                                "Catch-up after subscribing failed"
                            );
                            Step::Disconnected
                        }
                    },
                    Err(e) if e.is_fatal() => {
                        error!(monitor = %self.label, error = %e, "Subscription rejected, stopping");
                        return e;
                    }
                    Err(e) => {
                        warn!(monitor = %self.label, state = %state, error = %e, "Subscription failed");
                        Step::Disconnected
                    }
                },

                Step::Live(messages) => {
                    info!(monitor = %self.label, "Live liquidation monitoring");
                    let summary = self.live.consume(messages).await;
                    if summary.processed > 0 {
                        self.backoff.reset();
                    }
                    if summary.ended_by.is_fatal() {
                        return summary.ended_by;
                    }
                    error!(
                        monitor = %self.label,
                        processed = summary.processed,
                        skipped = summary.skipped,
                        reason = %summary.ended_by,
                        "Live session ended"
                    );
                    Step::Disconnected
                }

                Step::Disconnected => {
                    let delay = self.backoff.next_delay();
                    info!(
                        monitor = %self.label,
                        delay_ms = delay.as_millis() as u64,
                        "Reconnecting after backoff"
                    );
                    sleep(delay).await;
                    Step::Reconciling
                }
            };
        }
    }
}
