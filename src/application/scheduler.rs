//! Cancellable periodic tasks.
//!
//! Timer-driven work (capacity ticks, liveness sweeps) runs as a
//! [`PeriodicJob`] inside a [`ScheduledTask`]. The loop sleeps on a tokio
//! interval, so tests drive it with paused time instead of real sleeps.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Work executed on every tick.
#[async_trait]
pub trait PeriodicJob: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn run(&self);
}

/// Handle to a spawned periodic job.
///
/// Dropping the handle closes the shutdown channel, so the loop exits
/// after any in-flight run. [`cancel`](Self::cancel) does the same but
/// also waits for the task to finish.
pub struct ScheduledTask {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Spawns `job`, first running one `period` from now.
    pub fn spawn(job: Arc<dyn PeriodicJob>, period: Duration) -> Self {
        let name = job.name();
        let (shutdown, mut stop) = watch::channel(false);
        // Anchored at spawn time, not at the task's first poll.
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        debug!(job = job.name(), "Periodic job tick");
                        job.run().await;
                    }
                }
            }
            info!(job = job.name(), "Periodic job stopped");
        });

        info!(job = name, period_ms = period.as_millis() as u64, "Periodic job scheduled");
        Self {
            name,
            shutdown,
            handle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops the loop and waits for an in-flight run to complete.
    pub async fn cancel(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize);

    #[async_trait]
    impl PeriodicJob for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        async fn run(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runs_once_per_period() {
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let task = ScheduledTask::spawn(counter.clone(), Duration::from_secs(5));

        settle().await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);

        time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);

        task.cancel().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_further_runs() {
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let task = ScheduledTask::spawn(counter.clone(), Duration::from_secs(5));
        assert_eq!(task.name(), "counter");

        time::advance(Duration::from_secs(5)).await;
        settle().await;
        task.cancel().await;

        time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn first_run_is_one_period_after_spawn() {
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let task = ScheduledTask::spawn(counter.clone(), Duration::from_secs(5));

        // The task has not been polled yet when the clock moves.
        time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        task.cancel().await;
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_the_loop() {
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let task = ScheduledTask::spawn(counter.clone(), Duration::from_secs(5));
        time::advance(Duration::from_secs(5)).await;
        settle().await;

        drop(task);
        settle().await;
        time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }
}
