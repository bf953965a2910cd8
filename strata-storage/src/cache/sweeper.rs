//! Background Sweep Task
//!
//! Periodically drops expired entries from an [`LruCacher`]. The task holds
//! only a weak reference to the cache, so it ends on its own once the last
//! strong reference is dropped. Dropping the [`SweeperHandle`] also stops it.
//!
//! Ticks run one after another on a single task; a slow sweep delays the
//! next tick rather than overlapping it.

use std::sync::{Arc, Weak};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::codec::Codec;
use super::lru::LruCacher;

/// Owner of a running sweep task.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    join: Option<JoinHandle<u64>>,
}

impl SweeperHandle {
    /// Stop the task and wait for it. Returns the total entries it removed.
    pub async fn shutdown(mut self) -> u64 {
        let _ = self.shutdown_tx.send(true);
        match self.join.take() {
            Some(join) => join.await.unwrap_or(0),
            None => 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map(|j| j.is_finished()).unwrap_or(true)
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl<C: Codec> LruCacher<C> {
    /// Start sweeping every `gc_interval` on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>) -> SweeperHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(sweep_task(Arc::downgrade(self), shutdown_rx));
        SweeperHandle {
            shutdown_tx,
            join: Some(join),
        }
    }
}

async fn sweep_task<C: Codec>(
    cache: Weak<LruCacher<C>>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> u64 {
    let period = match cache.upgrade() {
        Some(cache) => cache.config().gc_interval,
        None => return 0,
    };
    if period.is_zero() {
        tracing::warn!("Cache sweeper not started: gc_interval is zero");
        return 0;
    }

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;

    tracing::info!(interval_ms = period.as_millis() as u64, "Cache sweeper started");

    let mut removed_total = 0u64;
    let mut cycles = 0u64;
    loop {
        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Cache sweeper shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                let Some(cache) = cache.upgrade() else {
                    tracing::info!("Cache dropped, sweeper exiting");
                    break;
                };
                removed_total += cache.sweep() as u64;
                cycles += 1;
            }
        }
    }

    tracing::info!(cycles, removed_total, "Cache sweeper completed");
    removed_total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MemoryStore;
    use crate::cache::traits::Cacher;
    use std::time::Duration;
    use strata_core::{CacheConfig, ManualClock};

    fn sweeping_cache() -> (Arc<LruCacher>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let config = CacheConfig::new()
            .with_ttl(Duration::from_secs(10))
            .with_gc_interval(Duration::from_millis(10));
        let cache = LruCacher::new(Arc::new(MemoryStore::new()), config).with_clock(clock.clone());
        (Arc::new(cache), clock)
    }

    async fn wait_until(mut done: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if done() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        done()
    }

    #[tokio::test]
    async fn test_sweeper_removes_expired_entries() {
        let (cache, clock) = sweeping_cache();
        cache.put_bean("t", "1", b"A").expect("put should succeed");
        let handle = cache.spawn_sweeper();

        clock.advance(Duration::from_secs(11));
        assert!(wait_until(|| cache.bean_count("t") == 0).await);

        assert_eq!(handle.shutdown().await, 1);
    }

    #[tokio::test]
    async fn test_sweeper_keeps_live_entries() {
        let (cache, _clock) = sweeping_cache();
        cache.put_bean("t", "1", b"A").expect("put should succeed");
        let handle = cache.spawn_sweeper();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.bean_count("t"), 1);
        assert_eq!(handle.shutdown().await, 0);
    }

    #[tokio::test]
    async fn test_dropping_cache_stops_sweeper() {
        let (cache, _clock) = sweeping_cache();
        let handle = cache.spawn_sweeper();
        drop(cache);

        assert!(wait_until(|| handle.is_finished()).await);
    }

    #[tokio::test]
    async fn test_dropping_handle_stops_sweeper() {
        let (cache, clock) = sweeping_cache();
        cache.put_bean("t", "1", b"A").expect("put should succeed");
        let handle = cache.spawn_sweeper();
        drop(handle);

        clock.advance(Duration::from_secs(11));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.bean_count("t"), 1);
        assert_eq!(Arc::strong_count(&cache), 1);
    }
}
