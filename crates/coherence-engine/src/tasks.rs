//! Background task registry
//!
//! Owns the reconciler loops, the metrics reporter and the notification
//! logger. Dropping the registry stops everything it spawned.
//!
//! # Blocking Lock Usage
//!
//! `parking_lot::Mutex` guards the JoinHandle list: pushes and the shutdown
//! drain are the only operations, and the lock never spans an `.await`.

use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Tracks spawned background loops and stops them cooperatively
#[derive(Debug)]
pub struct BackgroundTasks {
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl BackgroundTasks {
    /// Create an empty registry
    pub fn new() -> Self {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        Self {
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn a future that is dropped at shutdown
    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.changed() => {}
                _ = fut => {}
            }
        });
        self.handles.lock().push(handle);
    }

    /// Run `f` every `period` until shutdown.
    ///
    /// The first run happens one full period after spawning. Each run is
    /// awaited before the next tick is taken and missed ticks are skipped,
    /// so runs of one loop never overlap.
    pub fn spawn_interval<F, Fut>(&self, period: Duration, mut f: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => f().await,
                }
            }
        });
        self.handles.lock().push(handle);
    }

    /// Number of loops spawned and not yet shut down
    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    /// True when nothing is running
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Signal every loop to stop and abort the stragglers
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn interval_runs_after_each_period() {
        let tasks = BackgroundTasks::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        tasks.spawn_interval(Duration::from_secs(10), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_loops() {
        let tasks = BackgroundTasks::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        tasks.spawn_interval(Duration::from_secs(1), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(tasks.len(), 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        tasks.shutdown();
        let seen = runs.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), seen);
        assert!(tasks.is_empty());
    }
}
