use std::sync::Mutex;

use serde::Serialize;

use crate::app::Result;
use crate::domain::JobId;
use crate::queue::{Job, JobQueue};

/// Lifecycle of one worker link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    /// Spawned or connected, `Ready` not seen yet
    Starting,
    Ready,
    Busy,
    Dead,
}

#[derive(Debug)]
struct Inner {
    state: SlotState,
    job: Option<Job>,
    pid: Option<u32>,
    completed: u64,
}

/// State shared between a link driver and whoever supervises it.
///
/// The job a driver holds is recorded here so a supervisor that tears the
/// driver down can put it back on the queue.
#[derive(Debug)]
pub struct LinkState {
    inner: Mutex<Inner>,
}

/// Point-in-time view of a [`LinkState`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkSnapshot {
    pub state: SlotState,
    pub job: Option<String>,
    /// Process id the worker reported in `Ready`
    pub pid: Option<u32>,
    pub completed: u64,
}

impl Default for LinkState {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: SlotState::Starting,
                job: None,
                pid: None,
                completed: 0,
            }),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut inner)
    }

    pub fn state(&self) -> SlotState {
        self.with(|inner| inner.state)
    }

    pub fn mark_ready(&self, pid: u32) {
        self.with(|inner| {
            inner.state = SlotState::Ready;
            inner.pid = Some(pid);
        })
    }

    pub fn mark_dead(&self) {
        self.with(|inner| inner.state = SlotState::Dead)
    }

    /// Record the job just handed to the worker
    pub fn begin(&self, job: Job) {
        self.with(|inner| {
            inner.state = SlotState::Busy;
            inner.job = Some(job);
        })
    }

    /// Clear the held job once its outcome has been applied to the queue
    pub fn finish(&self, completed: bool) {
        self.with(|inner| {
            inner.job = None;
            if completed {
                inner.completed += 1;
            }
            if inner.state == SlotState::Busy {
                inner.state = SlotState::Ready;
            }
        })
    }

    /// Take the held job, if the driver stopped without resolving it
    pub fn take_job(&self) -> Option<Job> {
        self.with(|inner| inner.job.take())
    }

    /// Return the held job to the queue after the driver was stopped.
    ///
    /// A crash (`Some(reason)`) counts as a failed attempt; a deliberate
    /// stop puts the job back untouched.
    pub fn hand_back(&self, queue: &JobQueue, crash: Option<&str>) -> Result<Option<JobId>> {
        let Some(job) = self.take_job() else {
            return Ok(None);
        };
        match crash {
            Some(reason) => {
                queue.retry(&job, reason)?;
            }
            None => queue.release(&job)?,
        }
        Ok(Some(job.id))
    }

    pub fn snapshot(&self) -> LinkSnapshot {
        self.with(|inner| LinkSnapshot {
            state: inner.state,
            job: inner.job.as_ref().map(|job| job.id.to_string()),
            pid: inner.pid,
            completed: inner.completed,
        })
    }
}
