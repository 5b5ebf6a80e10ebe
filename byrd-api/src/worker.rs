use std::sync::Arc;

use byrd_core::SweepJob;
use byrd_offer::scheduler::SWEEP_INTERVAL_SECS;
use byrd_offer::{LifecycleScheduler, SweepReport};
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

use crate::metrics;

/// One sweep pass. Errors are logged and counted; they never escape the worker loop.
pub async fn run_sweep(scheduler: &LifecycleScheduler, job: SweepJob, now: DateTime<Utc>) -> Option<SweepReport> {
    match scheduler.run(job, now).await {
        Ok(report) => {
            metrics::observe_sweep(&report);
            Some(report)
        }
        Err(e) => {
            error!(job = job.as_str(), "Sweep abandoned: {}", e);
            metrics::observe_sweep_error(job);
            None
        }
    }
}

/// Spawn the three independent sweep timers. A stalled sweep only delays its own next tick.
pub fn start_sweep_workers(scheduler: Arc<LifecycleScheduler>) -> Vec<JoinHandle<()>> {
    SweepJob::ALL
        .into_iter()
        .map(|job| {
            let scheduler = scheduler.clone();
            tokio::spawn(async move {
                let mut ticker = interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                info!(job = job.as_str(), "Sweep worker started, every {}s", SWEEP_INTERVAL_SECS);

                loop {
                    ticker.tick().await;
                    run_sweep(&scheduler, job, Utc::now()).await;
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use byrd_core::memory::MemoryStore;
    use byrd_notify::NotificationDispatcher;

    fn scheduler(store: &MemoryStore) -> LifecycleScheduler {
        let notifier = Arc::new(NotificationDispatcher::new(Arc::new(store.clone())));
        LifecycleScheduler::new(Arc::new(store.clone()), Arc::new(store.clone()), notifier)
    }

    #[tokio::test]
    async fn test_failed_sweep_is_contained() {
        let store = MemoryStore::new();
        store.set_queries_failing(true).await;

        assert!(run_sweep(&scheduler(&store), SweepJob::Expire, Utc::now()).await.is_none());
    }

    #[tokio::test]
    async fn test_one_worker_per_job() {
        let store = MemoryStore::new();
        let handles = start_sweep_workers(Arc::new(scheduler(&store)));
        assert_eq!(handles.len(), SweepJob::ALL.len());
        for handle in handles {
            handle.abort();
        }
    }

    #[tokio::test]
    async fn test_empty_sweep_reports_zero() {
        let store = MemoryStore::new();
        let report = run_sweep(&scheduler(&store), SweepJob::Activate, Utc::now()).await.unwrap();
        assert_eq!(report.matched, 0);
        assert_eq!(report.processed, 0);
    }
}
