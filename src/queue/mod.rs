//! Job queue with in-flight dedup.
//!
//! An id enters the in-flight set when it is submitted and leaves it only
//! when [`JobQueue::reconcile`] observes its persisted artifact. Workers
//! never acknowledge directly, so membership is eventually consistent with
//! the store.
//!
//! Submission checks the store first, then the in-flight set, under one
//! lock. That is what keeps two workers off the same id, and it only holds
//! because submission and reconciliation share this process.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::{Result, SummaristError};
use crate::domain::{ArticleRecord, JobId, JobResult, JobState, SubmitOutcome, SubmitStatus};
use crate::store::ResultStore;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// A job handed to a worker
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub record: ArticleRecord,
    /// 1-based attempt number of this dispatch
    pub attempt: u32,
}

struct Entry {
    record: ArticleRecord,
    state: JobState,
    attempts: u32,
    failure: Option<String>,
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, Entry>,
    order: VecDeque<JobId>,
}

pub struct JobQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    store: Arc<dyn ResultStore>,
    max_attempts: u32,
}

impl JobQueue {
    pub fn new(store: Arc<dyn ResultStore>) -> Self {
        Self::with_max_attempts(store, DEFAULT_MAX_ATTEMPTS)
    }

    pub fn with_max_attempts(store: Arc<dyn ResultStore>, max_attempts: u32) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| SummaristError::Other(format!("Job queue lock poisoned: {}", e)))
    }

    /// Submit a record under the id derived from its link
    pub fn submit(&self, record: ArticleRecord) -> Result<SubmitOutcome> {
        let id = if record.link.trim().is_empty() {
            JobId::random()
        } else {
            JobId::for_link(&record.link)
        };
        self.submit_with_id(id, record)
    }

    /// Submit a record under a caller-chosen id
    pub fn submit_with_id(&self, id: JobId, record: ArticleRecord) -> Result<SubmitOutcome> {
        let mut inner = self.lock()?;

        if self.store.exists(&id) {
            debug!(%id, "Submission skipped, result exists");
            return Ok(SubmitOutcome {
                id,
                status: SubmitStatus::AlreadyExist,
            });
        }

        if let Some(entry) = inner.jobs.get(&id) {
            if matches!(entry.state, JobState::Pending | JobState::InFlight) {
                debug!(%id, "Submission skipped, job in flight");
                return Ok(SubmitOutcome {
                    id,
                    status: SubmitStatus::MayBeSummarizing,
                });
            }
        }

        inner.jobs.insert(
            id.clone(),
            Entry {
                record,
                state: JobState::Pending,
                attempts: 0,
                failure: None,
            },
        );
        inner.order.push_back(id.clone());
        drop(inner);

        self.notify.notify_one();
        info!(%id, "Job queued");

        Ok(SubmitOutcome {
            id,
            status: SubmitStatus::Started,
        })
    }

    /// Take the oldest pending job, waiting until one is queued
    pub async fn next_job(&self) -> Result<Job> {
        loop {
            if let Some(job) = self.try_next_job()? {
                return Ok(job);
            }
            self.notify.notified().await;
        }
    }

    /// Take the oldest pending job without waiting
    pub fn try_next_job(&self) -> Result<Option<Job>> {
        let mut inner = self.lock()?;
        let Inner { jobs, order } = &mut *inner;

        while let Some(id) = order.pop_front() {
            let Some(entry) = jobs.get_mut(&id) else {
                continue;
            };
            if entry.state != JobState::Pending {
                continue;
            }

            entry.state = JobState::InFlight;
            entry.attempts += 1;
            return Ok(Some(Job {
                id,
                record: entry.record.clone(),
                attempt: entry.attempts,
            }));
        }

        Ok(None)
    }

    /// Put a job back after a failed attempt.
    ///
    /// Returns `false` once the job has used up its attempts and is marked
    /// failed.
    pub fn retry(&self, job: &Job, reason: &str) -> Result<bool> {
        let mut inner = self.lock()?;

        let Some(entry) = inner.jobs.get_mut(&job.id) else {
            return Ok(false);
        };
        if entry.state != JobState::InFlight {
            return Ok(false);
        }

        if entry.attempts >= self.max_attempts {
            entry.state = JobState::Failed;
            entry.failure = Some(reason.to_string());
            warn!(id = %job.id, attempts = entry.attempts, reason, "Job failed");
            return Ok(false);
        }

        entry.state = JobState::Pending;
        inner.order.push_back(job.id.clone());
        drop(inner);

        self.notify.notify_one();
        warn!(id = %job.id, attempt = job.attempt, reason, "Job requeued");
        Ok(true)
    }

    /// Return a job a worker refused without counting the attempt
    pub fn release(&self, job: &Job) -> Result<()> {
        let mut inner = self.lock()?;

        let Some(entry) = inner.jobs.get_mut(&job.id) else {
            return Ok(());
        };
        if entry.state != JobState::InFlight {
            return Ok(());
        }

        entry.state = JobState::Pending;
        entry.attempts = entry.attempts.saturating_sub(1);
        inner.order.push_front(job.id.clone());
        drop(inner);

        self.notify.notify_one();
        debug!(id = %job.id, "Job released back to queue");
        Ok(())
    }

    /// Drop in-flight ids whose artifact has appeared. Returns how many.
    pub fn reconcile(&self) -> Result<usize> {
        let mut inner = self.lock()?;

        let done: Vec<JobId> = inner
            .jobs
            .iter()
            .filter(|(_, entry)| matches!(entry.state, JobState::Pending | JobState::InFlight))
            .map(|(id, _)| id.clone())
            .filter(|id| self.store.exists(id))
            .collect();

        for id in &done {
            inner.jobs.remove(id);
            debug!(%id, "Job reconciled");
        }

        Ok(done.len())
    }

    pub fn get_result(&self, id: &JobId) -> Result<JobResult> {
        if let Some(artifact) = self.store.read(id)? {
            return Ok(JobResult::Done(artifact));
        }

        let inner = self.lock()?;
        Ok(match inner.jobs.get(id) {
            Some(entry) => match entry.state {
                JobState::Pending | JobState::InFlight => JobResult::Pending,
                JobState::Failed => JobResult::Failed {
                    reason: entry.failure.clone().unwrap_or_default(),
                },
                // Done entries are removed by reconcile; treat a leftover as pending
                JobState::Done => JobResult::Pending,
            },
            None => JobResult::Unknown,
        })
    }

    pub fn state(&self, id: &JobId) -> Result<Option<JobState>> {
        if self.store.exists(id) {
            return Ok(Some(JobState::Done));
        }
        Ok(self.lock()?.jobs.get(id).map(|entry| entry.state))
    }

    /// Whether the id is currently in the in-flight set
    pub fn is_in_flight(&self, id: &JobId) -> Result<bool> {
        Ok(self
            .lock()?
            .jobs
            .get(id)
            .is_some_and(|entry| matches!(entry.state, JobState::Pending | JobState::InFlight)))
    }

    pub fn in_flight_count(&self) -> Result<usize> {
        Ok(self
            .lock()?
            .jobs
            .values()
            .filter(|entry| matches!(entry.state, JobState::Pending | JobState::InFlight))
            .count())
    }

    /// Jobs waiting for a worker
    pub fn queued_len(&self) -> Result<usize> {
        Ok(self
            .lock()?
            .jobs
            .values()
            .filter(|entry| entry.state == JobState::Pending)
            .count())
    }

    pub fn store(&self) -> &Arc<dyn ResultStore> {
        &self.store
    }
}

/// Run [`JobQueue::reconcile`] on a fixed interval
pub fn spawn_reconciler(queue: Arc<JobQueue>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        loop {
            timer.tick().await;
            match queue.reconcile() {
                Ok(0) => {}
                Ok(n) => debug!(count = n, "Reconciled finished jobs"),
                Err(e) => warn!(error = %e, "Reconcile failed"),
            }
        }
    })
}
