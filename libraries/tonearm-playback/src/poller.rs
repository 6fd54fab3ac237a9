//! Position polling while playing
//!
//! A tokio task ticks at a fixed interval and pushes a wakeup into a bounded
//! channel; the engine turns each wakeup into a play-time update on its own
//! thread. Ticks coalesce when the engine falls behind.

use crossbeam_channel::{Sender, TrySendError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Default polling interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Cancellable position ticker
#[derive(Debug)]
pub struct PositionPoller {
    runtime: Handle,
    interval: Duration,
    ticks: Sender<()>,
    cancel: Option<CancellationToken>,
}

impl PositionPoller {
    pub fn new(runtime: Handle, interval: Duration, ticks: Sender<()>) -> Self {
        Self {
            runtime,
            interval,
            ticks,
            cancel: None,
        }
    }

    /// Start ticking, restarting the ticker if it already runs
    pub fn start(&mut self) {
        self.stop();

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let ticks = self.ticks.clone();
        let period = self.interval;

        self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(TrySendError::Disconnected(())) = ticks.try_send(()) {
                            break;
                        }
                    }
                }
            }
            trace!("Position poller finished");
        });

        self.cancel = Some(token);
    }

    /// Stop ticking. Safe to call repeatedly or before any start.
    pub fn stop(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for PositionPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
