use std::future::Future;
use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Shortest period a schedule will tick at; shorter requests are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A recurring background trigger owned by one controller.
///
/// The first tick fires one full interval after arming. Cancelling stops
/// future ticks but never interrupts a tick that is already running.
#[derive(Debug)]
pub struct PollingSchedule {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PollingSchedule {
    /// Spawn the recurring task on the current tokio runtime.
    pub fn arm<F, Fut>(interval: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if interval < MIN_POLL_INTERVAL {
            debug!("Raising poll interval {interval:?} to {MIN_POLL_INTERVAL:?}");
        }
        let interval = interval.max(MIN_POLL_INTERVAL);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => on_tick().await,
                }
            }
        });

        Self { cancel, handle }
    }

    /// Whether the schedule will still fire.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for PollingSchedule {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
