use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How often the cleanup sweep scans the registry for leaked jobs.
const CLEANUP_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// A registered job that has not fired within this window is assumed leaked
/// (the underlying timer failed to deliver it) and is force-cancelled.
const STALE_JOB_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

pub type JobCallback = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("scheduler is shutting down, new jobs are rejected")]
    ShuttingDown,
}

struct JobEntry {
    /// Identifies this registration so a timer task that was replaced by a
    /// re-schedule of the same job id cannot fire the new entry.
    token: Uuid,
    fire_at: DateTime<Utc>,
    registered_at: Instant,
    callback: Option<JobCallback>,
    timer: Option<JoinHandle<()>>,
}

type Registry = Arc<Mutex<HashMap<String, JobEntry>>>;

/// Registry of named one-shot jobs fired at absolute timestamps.
///
/// At most one live job exists per id: re-scheduling an id cancels and
/// replaces the previous registration. A `fire_at` in the past fires
/// immediately. A periodic sweep evicts entries whose timer finished without
/// removing them, and entries older than [`STALE_JOB_WINDOW`] that never
/// fired.
pub struct JobScheduler {
    jobs: Registry,
    draining: AtomicBool,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl JobScheduler {
    /// Create the scheduler and start its cleanup sweep.
    pub async fn start() -> Arc<Self> {
        let scheduler = Arc::new(Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            draining: AtomicBool::new(false),
            sweeper: Mutex::new(None),
        });
        let sweeper = tokio::spawn(Self::sweep_loop(Arc::clone(&scheduler.jobs)));
        *scheduler.sweeper.lock().await = Some(sweeper);
        scheduler
    }

    /// Register `callback` to run once at `fire_at`, replacing any existing
    /// job with the same id.
    pub async fn schedule_message(
        &self,
        job_id: &str,
        fire_at: DateTime<Utc>,
        callback: JobCallback,
    ) -> Result<(), SchedulerError> {
        if self.draining.load(Ordering::SeqCst) {
            return Err(SchedulerError::ShuttingDown);
        }

        let mut jobs = self.jobs.lock().await;
        if let Some(previous) = jobs.remove(job_id) {
            if let Some(timer) = previous.timer {
                timer.abort();
            }
            debug!(job_id, "replacing existing job registration");
        }

        let token = Uuid::new_v4();
        // A send time already in the past clamps to an immediate fire.
        let delay = (fire_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let timer = tokio::spawn(Self::fire_after(
            Arc::clone(&self.jobs),
            job_id.to_string(),
            token,
            delay,
        ));
        jobs.insert(
            job_id.to_string(),
            JobEntry {
                token,
                fire_at,
                registered_at: Instant::now(),
                callback: Some(callback),
                timer: Some(timer),
            },
        );
        debug!(job_id, %fire_at, delay_ms = delay.as_millis() as u64, "job scheduled");
        Ok(())
    }

    /// Cancel the job if present; returns whether a job was found.
    pub async fn cancel_job(&self, job_id: &str) -> bool {
        let mut jobs = self.jobs.lock().await;
        match jobs.remove(job_id) {
            Some(entry) => {
                if let Some(timer) = entry.timer {
                    timer.abort();
                }
                debug!(job_id, "job cancelled");
                true
            }
            None => false,
        }
    }

    /// Next-invocation time of a live job.
    pub async fn job_info(&self, job_id: &str) -> Option<DateTime<Utc>> {
        self.jobs.lock().await.get(job_id).map(|entry| entry.fire_at)
    }

    pub async fn active_job_count(&self) -> usize {
        self.jobs.lock().await.len()
    }

    /// Enter the draining phase: reject new registrations, cancel every
    /// registered job and stop the sweep. Resolves once the registry is empty
    /// and all timer tasks have quiesced.
    pub async fn shutdown(&self) {
        self.draining.store(true, Ordering::SeqCst);

        let entries: Vec<JobEntry> = {
            let mut jobs = self.jobs.lock().await;
            jobs.drain().map(|(_, entry)| entry).collect()
        };
        let cancelled = entries.len();
        for entry in entries {
            if let Some(timer) = entry.timer {
                timer.abort();
                let _ = timer.await;
            }
        }

        if let Some(sweeper) = self.sweeper.lock().await.take() {
            sweeper.abort();
            let _ = sweeper.await;
        }
        info!(cancelled, "job scheduler drained");
    }

    async fn fire_after(jobs: Registry, job_id: String, token: Uuid, delay: Duration) {
        tokio::time::sleep(delay).await;

        // Remove the entry before running the callback so a callback that
        // re-schedules the same id does not race with its own removal.
        let callback = {
            let mut jobs = jobs.lock().await;
            let current = jobs
                .get(&job_id)
                .is_some_and(|entry| entry.token == token);
            if current {
                jobs.remove(&job_id)
                    .and_then(|mut entry| entry.callback.take())
            } else {
                None
            }
        };

        if let Some(callback) = callback {
            debug!(job_id, "job firing");
            callback.await;
        }
    }

    async fn sweep_loop(jobs: Registry) {
        let mut ticker = tokio::time::interval(CLEANUP_SWEEP_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            Self::sweep(&jobs).await;
        }
    }

    async fn sweep(jobs: &Mutex<HashMap<String, JobEntry>>) {
        let mut jobs = jobs.lock().await;
        jobs.retain(|job_id, entry| {
            let timer_gone = entry
                .timer
                .as_ref()
                .map(JoinHandle::is_finished)
                .unwrap_or(true);
            let stale = entry.registered_at.elapsed() >= STALE_JOB_WINDOW;
            if timer_gone || stale {
                if let Some(timer) = entry.timer.take() {
                    timer.abort();
                }
                warn!(job_id, stale, "cleanup sweep evicted leaked job");
                false
            } else {
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use super::*;

    fn flag_callback(flag: &Arc<AtomicBool>) -> JobCallback {
        let flag = Arc::clone(flag);
        Box::pin(async move {
            flag.store(true, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_the_previous_job() {
        let scheduler = JobScheduler::start().await;
        let first = Arc::new(AtomicBool::new(false));
        let second = Arc::new(AtomicBool::new(false));

        let t1 = Utc::now() + chrono::Duration::seconds(5);
        let t2 = Utc::now() + chrono::Duration::seconds(10);
        scheduler
            .schedule_message("msg-1", t1, flag_callback(&first))
            .await
            .unwrap();
        scheduler
            .schedule_message("msg-1", t2, flag_callback(&second))
            .await
            .unwrap();

        assert_eq!(scheduler.active_job_count().await, 1);
        assert_eq!(scheduler.job_info("msg-1").await, Some(t2));

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(!first.load(Ordering::SeqCst));
        assert!(second.load(Ordering::SeqCst));
        assert_eq!(scheduler.active_job_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn past_send_time_fires_immediately() {
        let scheduler = JobScheduler::start().await;
        let fired = Arc::new(AtomicBool::new(false));

        let three_hours_ago = Utc::now() - chrono::Duration::hours(3);
        scheduler
            .schedule_message("late", three_hours_ago, flag_callback(&fired))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(fired.load(Ordering::SeqCst));
        assert_eq!(scheduler.active_job_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn firing_removes_the_job_from_the_registry() {
        let scheduler = JobScheduler::start().await;
        let fired = Arc::new(AtomicBool::new(false));

        let fire_at = Utc::now() + chrono::Duration::seconds(2);
        scheduler
            .schedule_message("msg-2", fire_at, flag_callback(&fired))
            .await
            .unwrap();
        assert_eq!(scheduler.active_job_count().await, 1);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(fired.load(Ordering::SeqCst));
        assert_eq!(scheduler.active_job_count().await, 0);
        assert_eq!(scheduler.job_info("msg-2").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_evicts_jobs_older_than_the_staleness_window() {
        let scheduler = JobScheduler::start().await;
        let fired = Arc::new(AtomicBool::new(false));

        let far_future = Utc::now() + chrono::Duration::hours(48);
        scheduler
            .schedule_message("stale", far_future, flag_callback(&fired))
            .await
            .unwrap();
        assert_eq!(scheduler.active_job_count().await, 1);

        // 25 simulated hours later the sweep has force-cancelled the job.
        tokio::time::sleep(Duration::from_secs(25 * 60 * 60)).await;
        assert_eq!(scheduler.active_job_count().await, 0);
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_reports_whether_a_job_existed() {
        let scheduler = JobScheduler::start().await;
        let fired = Arc::new(AtomicBool::new(false));

        let fire_at = Utc::now() + chrono::Duration::hours(1);
        scheduler
            .schedule_message("msg-3", fire_at, flag_callback(&fired))
            .await
            .unwrap();

        assert!(scheduler.cancel_job("msg-3").await);
        assert!(!scheduler.cancel_job("msg-3").await);
        assert_eq!(scheduler.active_job_count().await, 0);

        tokio::time::sleep(Duration::from_secs(2 * 60 * 60)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_rejects_new_work_and_drains_existing_jobs() {
        let scheduler = JobScheduler::start().await;
        let fired = Arc::new(AtomicBool::new(false));

        let fire_at = Utc::now() + chrono::Duration::hours(1);
        scheduler
            .schedule_message("a", fire_at, flag_callback(&fired))
            .await
            .unwrap();
        scheduler
            .schedule_message("b", fire_at, flag_callback(&fired))
            .await
            .unwrap();
        assert_eq!(scheduler.active_job_count().await, 2);

        scheduler.shutdown().await;
        assert_eq!(scheduler.active_job_count().await, 0);

        let rejected = scheduler
            .schedule_message("c", fire_at, flag_callback(&fired))
            .await;
        assert_eq!(rejected, Err(SchedulerError::ShuttingDown));
        assert!(!fired.load(Ordering::SeqCst));
    }
}
