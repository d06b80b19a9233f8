//! Delayed job scheduler
//!
//! This module provides one background timing loop for delayed notifications:
//! - Jobs are keyed by id and ordered by fire time
//! - The loop sleeps until the soonest fire time, or until a job is inserted
//! - Each due job is removed from the table and run exactly once on its own task
//! - Pending jobs can be cancelled until they fire
//!
//! Nothing is persisted; pending jobs are dropped on shutdown.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Upper bound on one idle sleep when nothing is scheduled
const IDLE_WAIT: Duration = Duration::from_secs(3600);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("fire time {fire_at} is not in the future")]
    NotInFuture { fire_at: DateTime<Utc> },

    #[error("job {job_id} is already scheduled")]
    DuplicateJob { job_id: String },

    #[error("no pending job {job_id}")]
    JobNotFound { job_id: String },
}

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Position in the time-ordered table; `seq` breaks ties between equal fire times
type SlotKey = (DateTime<Utc>, u64);

struct ScheduledJob {
    job_id: String,
    run: Job,
}

#[derive(Default)]
struct JobTable {
    by_time: BTreeMap<SlotKey, ScheduledJob>,
    slots: HashMap<String, SlotKey>,
    next_seq: u64,
}

impl JobTable {
    fn take_due(&mut self, now: DateTime<Utc>) -> Vec<(SlotKey, ScheduledJob)> {
        let mut due = Vec::new();
        while let Some(entry) = self.by_time.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let (key, job) = entry.remove_entry();
            self.slots.remove(&job.job_id);
            due.push((key, job));
        }
        due
    }

    fn next_fire_at(&self) -> Option<DateTime<Utc>> {
        self.by_time.keys().next().map(|(fire_at, _)| *fire_at)
    }
}

struct SchedulerInner {
    jobs: Mutex<JobTable>,
    wake: Notify,
}

/// Handle to the shared job table; clones share the same loop
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                jobs: Mutex::new(JobTable::default()),
                wake: Notify::new(),
            }),
        }
    }

    /// Spawn the timing loop. It exits when `shutdown` is cancelled.
    pub fn start(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let inner = self.inner.clone();
        info!("Starting scheduler loop");

        tokio::spawn(async move {
            loop {
                let (due, next_fire_at) = {
                    let mut jobs = inner.jobs.lock();
                    let due = jobs.take_due(Utc::now());
                    (due, jobs.next_fire_at())
                };

                for ((fire_at, _), job) in due {
                    debug!(job_id = %job.job_id, %fire_at, "Running scheduled job");
                    tokio::spawn((job.run)());
                }

                let wait = next_fire_at
                    .map(|at| (at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
                    .unwrap_or(IDLE_WAIT)
                    .min(IDLE_WAIT);

                tokio::select! {
                    _ = shutdown.cancelled() => {
                        let dropped = inner.jobs.lock().by_time.len();
                        info!(dropped, "Scheduler loop shutting down");
                        break;
                    }
                    _ = inner.wake.notified() => {}
                    _ = tokio::time::sleep(wait) => {}
                }
            }
        })
    }

    /// Register `job` to run once at `fire_at`
    pub fn schedule<F, Fut>(
        &self,
        job_id: impl Into<String>,
        fire_at: DateTime<Utc>,
        job: F,
    ) -> Result<(), SchedulerError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let job_id = job_id.into();
        if fire_at <= Utc::now() {
            return Err(SchedulerError::NotInFuture { fire_at });
        }

        {
            let mut jobs = self.inner.jobs.lock();
            if jobs.slots.contains_key(&job_id) {
                return Err(SchedulerError::DuplicateJob { job_id });
            }

            let key = (fire_at, jobs.next_seq);
            jobs.next_seq += 1;
            jobs.slots.insert(job_id.clone(), key);
            jobs.by_time.insert(
                key,
                ScheduledJob {
                    job_id: job_id.clone(),
                    run: Box::new(move || job().boxed()),
                },
            );
        }

        info!(job_id = %job_id, %fire_at, "Job scheduled");
        self.inner.wake.notify_one();
        Ok(())
    }

    /// Remove a pending job. Jobs that already fired are not found.
    pub fn cancel(&self, job_id: &str) -> Result<(), SchedulerError> {
        let mut jobs = self.inner.jobs.lock();
        let key = jobs
            .slots
            .remove(job_id)
            .ok_or_else(|| SchedulerError::JobNotFound {
                job_id: job_id.to_string(),
            })?;
        jobs.by_time.remove(&key);
        drop(jobs);

        info!(job_id = %job_id, "Scheduled job cancelled");
        self.inner.wake.notify_one();
        Ok(())
    }

    pub fn is_pending(&self, job_id: &str) -> bool {
        self.inner.jobs.lock().slots.contains_key(job_id)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.jobs.lock().by_time.len()
    }

    pub fn next_fire_at(&self) -> Option<DateTime<Utc>> {
        self.inner.jobs.lock().next_fire_at()
    }
}
