use std::future::Future;
use std::sync::{Mutex, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};

/// Coalesces concurrent calls into one in-flight future.
///
/// Callers arriving while a flight is running await that flight and share its
/// output. The slot is cleared once the flight finishes, so the next call
/// starts fresh.
pub(crate) struct SingleFlight<T: Clone> {
    slot: Mutex<Option<Shared<BoxFuture<'static, T>>>>,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    pub(crate) async fn run<F, Fut>(&self, start: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let flight = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = slot.as_ref() {
                existing.clone()
            } else {
                let started = start().boxed().shared();
                *slot = Some(started.clone());
                started
            }
        };

        let output = flight.clone().await;

        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&flight)) {
            *slot = None;
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::SingleFlight;

    fn counted(starts: &Arc<AtomicUsize>) -> impl std::future::Future<Output = usize> + use<> {
        let run = starts.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            run
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_calls_share_one_flight() {
        let flight = SingleFlight::new();
        let starts = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            flight.run(|| counted(&starts)),
            flight.run(|| counted(&starts))
        );

        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!((a, b), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn finished_flight_is_not_reused() {
        let flight = SingleFlight::new();
        let starts = Arc::new(AtomicUsize::new(0));

        let first = flight.run(|| counted(&starts)).await;
        let second = flight.run(|| counted(&starts)).await;

        assert_eq!((first, second), (1, 2));
        assert_eq!(starts.load(Ordering::SeqCst), 2);
    }
}
